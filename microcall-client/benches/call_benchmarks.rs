use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use microcall_client::args;
use microcall_client::microcall_core::{
    CallContext, DescriptorCache, InterceptorChain, JsonSerializer, MethodContract, ParamSpec,
    RawResponse, RequestBuilder, ResponseResolver, ServiceContract, TypeRef,
};
use serde_json::json;
use std::hint::black_box;

fn contract(fields: usize) -> ServiceContract {
    let mut update = MethodContract::new("update")
        .put("/accounts/{id}")
        .param(ParamSpec::path("id", "id"));
    for i in 0..fields {
        update = update.param(ParamSpec::payload_at(
            format!("f{}", i),
            format!("account.section{}.f{}", i % 4, i),
        ));
    }

    ServiceContract::new("Accounts")
        .service("accounts")
        .method(update)
        .method(
            MethodContract::new("list")
                .get("/accounts")
                .returns(TypeRef::list(TypeRef::object("Account"))),
        )
}

fn bench_descriptor_resolve(c: &mut Criterion) {
    let contract = contract(4);
    let cache = DescriptorCache::new();
    let _ = cache.resolve(&contract, "list");

    c.bench_function("descriptor_resolve_cached", |b| {
        b.iter(|| black_box(cache.resolve(&contract, "list")))
    });

    c.bench_function("descriptor_resolve_cold", |b| {
        b.iter(|| {
            let cache = DescriptorCache::new();
            black_box(cache.resolve(&contract, "update"))
        })
    });
}

fn bench_request_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("request_build");
    let interceptors = InterceptorChain::new();
    let context = CallContext::new()
        .with_header("x-tenant", "acme")
        .with_header("x-request-id", "bench");

    for fields in [1usize, 8, 32].iter() {
        let contract = contract(*fields);
        let cache = DescriptorCache::new();
        let Ok(descriptor) = cache.resolve(&contract, "update") else {
            continue;
        };
        let mut arguments = args!["acct 1"];
        arguments.extend((0..*fields).map(|i| microcall_client::Argument::from(i as i64)));

        group.bench_with_input(BenchmarkId::new("merged_tree", fields), fields, |b, _| {
            b.iter(|| {
                let request = RequestBuilder::new(&descriptor, &interceptors).build(&arguments, &context);
                black_box(request)
            })
        });
    }

    group.finish();
}

fn bench_response_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("response_resolve");
    let contract = contract(1);
    let cache = DescriptorCache::new();
    let Ok(descriptor) = cache.resolve(&contract, "list") else {
        return;
    };
    let resolver = ResponseResolver::new(&JsonSerializer, true);

    for size in [1usize, 100, 1000].iter() {
        let items: Vec<_> = (0..*size)
            .map(|i| json!({"id": i, "owner": format!("user{}", i), "active": true}))
            .collect();
        let body = serde_json::to_vec(&items).unwrap_or_default();

        group.bench_with_input(BenchmarkId::new("list", size), &body, |b, body| {
            b.iter(|| {
                let response = RawResponse::ok(body.clone());
                black_box(resolver.resolve(Ok(response), &descriptor))
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_descriptor_resolve,
    bench_request_build,
    bench_response_resolve
);
criterion_main!(benches);
