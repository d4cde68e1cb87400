//! Compile throughput for synthetic filter lists and JSON rule sets.
//!
//! Run with: `cargo bench -p rl-compiler`

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use rl_compiler::{compile, CompileOptions};
use rl_core::{Identifier, RawRuleSource};

fn synthetic_filter_list(hosts: usize) -> RawRuleSource {
    let mut text = String::from("[Adblock Plus 2.0]\n! synthetic\n");
    for i in 0..hosts {
        text.push_str(&format!("||ads{}.example{}.com^\n", i, i % 97));
        if i % 10 == 0 {
            text.push_str(&format!("/banner{}/*.gif$image,third-party\n", i));
        }
        if i % 25 == 0 {
            text.push_str(&format!("news{}.org##.sponsored-{}\n", i, i));
        }
    }
    RawRuleSource::from(text)
}

fn synthetic_json(rules: usize) -> RawRuleSource {
    let entries: Vec<String> = (0..rules)
        .map(|i| {
            format!(
                r#"{{"trigger": {{"url-filter": "tracker{}\\.js", "if-domain": ["site{}.com"]}}, "action": {{"type": "block"}}}}"#,
                i,
                i % 50
            )
        })
        .collect();
    RawRuleSource::from(format!("[{}]", entries.join(",")))
}

fn bench_filter_list(c: &mut Criterion) {
    let id = Identifier::new("bench-hosts").unwrap();
    let source = synthetic_filter_list(10_000);
    let options = CompileOptions::default();

    c.bench_function("compile_filter_list_10k", |b| {
        b.iter(|| compile(black_box(&id), black_box(&source), &options).unwrap())
    });
}

fn bench_json(c: &mut Criterion) {
    let id = Identifier::new("bench-json").unwrap();
    let source = synthetic_json(2_000);
    let options = CompileOptions::default();

    c.bench_function("compile_json_2k", |b| {
        b.iter(|| compile(black_box(&id), black_box(&source), &options).unwrap())
    });
}

criterion_group!(benches, bench_filter_list, bench_json);
criterion_main!(benches);
