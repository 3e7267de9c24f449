//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Benchmarks for the PBX wire codec

use bytes::BytesMut;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pbx_core::{next_line, Command, Extension, Notification};

fn bench_command_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("command_parsing");

    group.bench_function("pickup", |b| b.iter(|| Command::parse(black_box("pickup"))));
    group.bench_function("dial", |b| b.iter(|| Command::parse(black_box("dial 512"))));
    group.bench_function("chat", |b| {
        b.iter(|| Command::parse(black_box("chat the quick brown fox")))
    });
    group.bench_function("malformed", |b| {
        b.iter(|| Command::parse(black_box("DIAL 512")))
    });

    group.finish();
}

fn bench_line_reassembly(c: &mut Criterion) {
    let input: &[u8] = b"pickup\r\ndial 5\r\nchat hello there\r\nhangup\r\n";

    c.bench_function("next_line_burst", |b| {
        b.iter(|| {
            let mut buffer = BytesMut::from(input);
            while let Some(line) = next_line(&mut buffer) {
                black_box(line);
            }
        })
    });
}

fn bench_notification_encoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("notification_encoding");

    group.bench_function("on_hook", |b| {
        b.iter(|| Notification::OnHook(Extension::new(4)).encode())
    });
    group.bench_function("connected", |b| {
        b.iter(|| Notification::Connected(Extension::new(42)).encode())
    });
    group.bench_function("chat", |b| {
        b.iter(|| Notification::Chat("the quick brown fox".to_string()).encode())
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_command_parsing,
    bench_line_reassembly,
    bench_notification_encoding
);
criterion_main!(benches);
