use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};
use microcall_core::{
    Argument, CallContext, DescriptorCache, ErrorKind, InterceptorChain, JsonSerializer,
    MethodContract, ParamSpec, Payload, RawResponse, Reply, RequestBuilder, ResponseResolver,
    ServiceContract, StructuredSerializer, TransportFailure, TypeRef,
};
use serde_json::json;
use std::sync::Arc;
use std::thread;

fn inventory() -> ServiceContract {
    ServiceContract::new("Inventory")
        .service("inventory")
        .method(
            MethodContract::new("stock")
                .get("/warehouses/{warehouse}/items/{sku}")
                .param(ParamSpec::path("warehouse", "warehouse"))
                .param(ParamSpec::path("sku", "sku"))
                .returns(TypeRef::optional(TypeRef::Integer)),
        )
        .method(
            MethodContract::new("adjust")
                .patch("/items")
                .param(ParamSpec::payload_at("sku", "item.sku"))
                .param(ParamSpec::payload_at("delta", "item.delta"))
                .param(ParamSpec::header("reason", "x-reason"))
                .returns(TypeRef::response(TypeRef::Any)),
        )
}

#[test]
fn test_request_and_reply_for_path_method() {
    let contract = inventory();
    let cache = DescriptorCache::new();
    let descriptor = cache.resolve(&contract, "stock").unwrap();
    let chain = InterceptorChain::new();

    let request = RequestBuilder::new(&descriptor, &chain)
        .build(
            &[Argument::from("east/2"), Argument::from("sku 9")],
            &CallContext::new().with_header("x-trace", "t1"),
        )
        .unwrap();

    assert_eq!(request.verb, Method::GET);
    assert_eq!(request.path, "/warehouses/east%2F2/items/sku%209");
    assert_eq!(request.headers.get("x-trace").unwrap(), "t1");
    assert!(request.payload.is_none());

    let resolver = ResponseResolver::new(&JsonSerializer, true);
    let empty = resolver
        .resolve(Ok(RawResponse::ok(Bytes::new())), &descriptor)
        .unwrap();
    assert!(matches!(empty, Reply::Optional(None)));

    let found = resolver
        .resolve(Ok(RawResponse::ok("12")), &descriptor)
        .unwrap();
    assert_eq!(found.into_optional::<i64>().unwrap(), Some(12));
}

#[test]
fn test_request_and_reply_for_merged_payload_method() {
    let contract = inventory();
    let cache = DescriptorCache::new();
    let descriptor = cache.resolve(&contract, "adjust").unwrap();
    let chain = InterceptorChain::new();

    let request = RequestBuilder::new(&descriptor, &chain)
        .build(
            &[Argument::from("sku-1"), Argument::from(-3), Argument::from("damaged")],
            &CallContext::new(),
        )
        .unwrap();

    assert_eq!(request.verb, Method::PATCH);
    assert_eq!(request.headers.get("x-reason").unwrap(), "damaged");
    match &request.payload {
        Payload::Structured(tree) => {
            assert_eq!(tree, &json!({"item": {"sku": "sku-1", "delta": -3}}))
        }
        other => panic!("expected a structured payload, got {:?}", other),
    }
    let body = request.body(&JsonSerializer).unwrap().unwrap();
    assert_eq!(
        JsonSerializer.decode_tree(&body).unwrap(),
        json!({"item": {"sku": "sku-1", "delta": -3}})
    );

    let resolver = ResponseResolver::new(&JsonSerializer, true);
    let conflict = resolver
        .resolve(
            Err(TransportFailure::Response {
                status: StatusCode::CONFLICT,
                headers: HeaderMap::new(),
                body: Bytes::from_static(b"stale"),
            }),
            &descriptor,
        )
        .unwrap()
        .into_response::<String>()
        .unwrap();
    assert_eq!(conflict.status, StatusCode::CONFLICT);
    assert_eq!(conflict.body.as_deref(), Some("stale"));

    let err = resolver
        .resolve(Err(TransportFailure::connection("reset")), &descriptor)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);
}

#[test]
fn test_cache_shared_across_threads_builds_each_method_once() {
    let contract = Arc::new(inventory());
    let cache = Arc::new(DescriptorCache::new());

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let contract = Arc::clone(&contract);
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                let method = if i % 2 == 0 { "stock" } else { "adjust" };
                cache.resolve(&contract, method).unwrap()
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(cache.builds(), 2);
    assert_eq!(cache.len(), 2);
}
