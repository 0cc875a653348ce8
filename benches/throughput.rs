use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use http::Method;
use triroute::dispatcher::{handler, Ctx, Handler};
use triroute::router::{Router, Routing};

fn ok() -> Handler {
    handler(|ctx: &mut Ctx| {
        ctx.send_string("ok");
        Ok(())
    })
}

fn pass() -> Handler {
    handler(|ctx: &mut Ctx| ctx.next())
}

/// The verb zoo: a realistic mix of literals, parameters and middleware.
fn zoo_router() -> Router {
    let router = Router::new();
    router.use_at("/", [pass()]).unwrap();
    router.get("/", [ok()]).unwrap();
    router.get("/zoo/animals", [ok()]).unwrap();
    router.post("/zoo/animals", [ok()]).unwrap();
    router.get("/zoo/animals/:id", [ok()]).unwrap();
    router.put("/zoo/animals/:id", [ok()]).unwrap();
    router.patch("/zoo/animals/:id", [ok()]).unwrap();
    router.delete("/zoo/animals/:id", [ok()]).unwrap();
    router.get("/zoo/animals/:id/toys/:toy_id", [ok()]).unwrap();
    router
        .get(
            "/zoo/:category/animals/:id/habitats/:habitat_id/sections/:section_id",
            [ok()],
        )
        .unwrap();
    router
        .post(
            "/inventory/:warehouse_id/feeds/:feed_id/items/:item_id/batches/:batch_id",
            [ok()],
        )
        .unwrap();
    router
        .get("/complex/:a/:b/:c/:d/:e/:f/:g/:h/:i", [ok()])
        .unwrap();
    router.head("/zoo/health", [ok()]).unwrap();
    router.options("/zoo/health", [ok()]).unwrap();
    router.trace("/zoo/health", [ok()]).unwrap();
    router
}

/// Many routes spread over distinct three-byte prefixes.
fn wide_router(routes: usize) -> Router {
    let router = Router::new();
    for i in 0..routes {
        let a = (b'a' + (i % 26) as u8) as char;
        let b = (b'a' + ((i / 26) % 26) as u8) as char;
        router
            .get(&format!("/{a}{b}/resource{i}/:id"), [ok()])
            .unwrap();
    }
    router
}

const ZOO_PATHS: [(Method, &str); 5] = [
    (Method::GET, "/zoo/animals/123"),
    (Method::GET, "/zoo/animals/123/toys/456"),
    (Method::GET, "/zoo/cats/animals/123/habitats/88/sections/5"),
    (Method::POST, "/inventory/1/feeds/2/items/3/batches/4"),
    (Method::GET, "/complex/1/2/3/4/5/6/7/8/9"),
];

fn bench_route_throughput(c: &mut Criterion) {
    let router = zoo_router();
    c.bench_function("dispatch_zoo", |b| {
        b.iter(|| {
            for (method, path) in ZOO_PATHS.iter() {
                let mut ctx = router.context(method.clone(), path);
                black_box(router.dispatch(&mut ctx).ok());
            }
        })
    });
}

fn bench_bucketed_vs_linear(c: &mut Criterion) {
    let router = wide_router(500);
    let snapshot = router.snapshot();
    let path = "/ij/resource242/123";
    c.bench_function("first_match_bucketed_500", |b| {
        b.iter(|| black_box(snapshot.first_match(&Method::GET, black_box(path))))
    });
    c.bench_function("first_match_linear_500", |b| {
        b.iter(|| black_box(snapshot.first_match_linear(&Method::GET, black_box(path))))
    });
}

fn bench_handle(c: &mut Criterion) {
    let router = zoo_router();
    c.bench_function("handle_request", |b| {
        b.iter(|| {
            let req = http::Request::get("/zoo/animals/123")
                .body(bytes::Bytes::new())
                .unwrap();
            black_box(router.handle(req))
        })
    });
}

criterion_group!(benches, bench_route_throughput, bench_bucketed_vs_linear, bench_handle);
criterion_main!(benches);
