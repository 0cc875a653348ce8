use http::Method;
use triroute::router::{Router, Routing};
use triroute::{DispatchError, RegistrationError};

mod common;
use common::{body_of, pass, reply, trail};

fn zoo_router() -> Router {
    let router = Router::new();
    router.get("/", [reply("root_handler")]).unwrap();
    router.get("/zoo/animals", [reply("get_animals")]).unwrap();
    router.post("/zoo/animals", [reply("create_animal")]).unwrap();
    router.get("/zoo/animals/:id", [reply("get_animal")]).unwrap();
    router.put("/zoo/animals/:id", [reply("update_animal")]).unwrap();
    router.patch("/zoo/animals/:id", [reply("patch_animal")]).unwrap();
    router.delete("/zoo/animals/:id", [reply("delete_animal")]).unwrap();
    router.head("/zoo/health", [reply("health_check")]).unwrap();
    router.options("/zoo/health", [reply("supported_ops")]).unwrap();
    router.trace("/zoo/health", [reply("trace_route")]).unwrap();
    router.connect("/zoo/tunnel", [reply("tunnel")]).unwrap();
    router
}

fn assert_route_match(router: &Router, method: Method, path: &str, expected: &str) {
    match body_of(router, method.clone(), path) {
        Ok(body) => assert_eq!(body, expected, "Handler mismatch for {method} {path}"),
        Err(e) => assert_eq!(expected, "<none>", "Expected {method} {path} to match, got {e}"),
    }
}

#[test]
fn test_router_verbs() {
    let router = zoo_router();
    assert_route_match(&router, Method::GET, "/zoo/animals", "get_animals");
    assert_route_match(&router, Method::POST, "/zoo/animals", "create_animal");
    assert_route_match(&router, Method::GET, "/zoo/animals/123", "get_animal");
    assert_route_match(&router, Method::PUT, "/zoo/animals/123", "update_animal");
    assert_route_match(&router, Method::PATCH, "/zoo/animals/123", "patch_animal");
    assert_route_match(&router, Method::DELETE, "/zoo/animals/123", "delete_animal");
    assert_route_match(&router, Method::HEAD, "/zoo/health", "health_check");
    assert_route_match(&router, Method::OPTIONS, "/zoo/health", "supported_ops");
    assert_route_match(&router, Method::TRACE, "/zoo/health", "trace_route");
    assert_route_match(&router, Method::CONNECT, "/zoo/tunnel", "tunnel");
}

#[test]
fn test_router_root_and_unknown_path() {
    let router = zoo_router();
    assert_route_match(&router, Method::GET, "/", "root_handler");
    assert_route_match(&router, Method::GET, "/unknown", "<none>");
    assert_route_match(&router, Method::GET, "/zoo/animals/1/extra", "<none>");
}

#[test]
fn test_literal_registered_first_wins_over_param() {
    let router = Router::new();
    router.get("/users/list", [reply("list")]).unwrap();
    router.get("/users/:id", [reply("user")]).unwrap();
    assert_eq!(body_of(&router, Method::GET, "/users/list").unwrap(), "list");
    assert_eq!(body_of(&router, Method::GET, "/users/7").unwrap(), "user");

    // registration order is priority: a param registered first shadows the literal
    let shadowed = Router::new();
    shadowed.get("/users/:id", [reply("user")]).unwrap();
    shadowed.get("/users/list", [reply("list")]).unwrap();
    assert_eq!(body_of(&shadowed, Method::GET, "/users/list").unwrap(), "user");
}

#[test]
fn test_duplicate_registration_merges_handlers() {
    let router = Router::new();
    let first = router.get("/dup", [trail("one", true)]).unwrap().id();
    let second = router.get("/dup", [trail("two", false)]).unwrap().id();
    assert_eq!(first, second);

    let routes = router.routes();
    assert_eq!(routes.len(), 1);
    assert_eq!(routes[0].handlers, 2);
    assert_eq!(body_of(&router, Method::GET, "/dup").unwrap(), "one,two");
}

#[test]
fn test_duplicate_middleware_merges_but_not_with_terminal() {
    let router = Router::new();
    let a = router.use_at("/api", [pass()]).unwrap().id();
    let b = router.use_at("/api", [pass()]).unwrap().id();
    let c = router.get("/api", [reply("api")]).unwrap().id();
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(body_of(&router, Method::GET, "/api").unwrap(), "api");
}

#[test]
fn test_method_not_allowed_versus_not_found() {
    let router = zoo_router();
    match body_of(&router, Method::POST, "/zoo/animals/5") {
        Err(DispatchError::MethodNotAllowed { allowed }) => {
            assert!(allowed.contains(&Method::GET));
            assert!(allowed.contains(&Method::PUT));
            assert!(allowed.contains(&Method::PATCH));
            assert!(allowed.contains(&Method::DELETE));
            assert!(!allowed.contains(&Method::POST));
        }
        other => panic!("expected MethodNotAllowed, got {other:?}"),
    }
    match body_of(&router, Method::GET, "/nowhere") {
        Err(DispatchError::NotFound { method, path }) => {
            assert_eq!(method, Method::GET);
            assert_eq!(path, "/nowhere");
        }
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[test]
fn test_middleware_alone_does_not_mark_matched() {
    let router = Router::new();
    router.use_at("/", [pass()]).unwrap();
    router.get("/only-get", [reply("g")]).unwrap();
    let err = body_of(&router, Method::POST, "/only-get").unwrap_err();
    assert!(matches!(err, DispatchError::MethodNotAllowed { .. }));
    let err = body_of(&router, Method::POST, "/else").unwrap_err();
    assert!(matches!(err, DispatchError::NotFound { .. }));
}

#[test]
fn test_middleware_matches_literal_prefix() {
    let router = Router::new();
    router.use_at("/api", [trail("mw", true)]).unwrap();
    router.get("/api/x", [trail("x", false)]).unwrap();
    router.get("/apix", [trail("apix", false)]).unwrap();
    router.get("/ap", [trail("ap", false)]).unwrap();
    assert_eq!(body_of(&router, Method::GET, "/api/x").unwrap(), "mw,x");
    assert_eq!(body_of(&router, Method::GET, "/apix").unwrap(), "mw,apix");
    assert_eq!(body_of(&router, Method::GET, "/ap").unwrap(), "ap");
}

#[test]
fn test_middleware_with_params_matches_whole_segments() {
    let router = Router::new();
    router.use_at("/users/:id", [trail("user-mw", true)]).unwrap();
    router.get("/users/:id/posts", [trail("posts", false)]).unwrap();
    router.get("/usersx/:id", [trail("other", false)]).unwrap();
    assert_eq!(
        body_of(&router, Method::GET, "/users/7/posts").unwrap(),
        "user-mw,posts"
    );
    assert_eq!(body_of(&router, Method::GET, "/usersx/7").unwrap(), "other");
}

#[test]
fn test_wildcard_captures() {
    let router = Router::new();
    router.get("/files/*", [reply("files")]).unwrap();
    router.get("/*", [reply("catch")]).unwrap();

    let mut ctx = router.context(Method::GET, "/files/a/b/c.txt");
    router.dispatch(&mut ctx).unwrap();
    assert_eq!(ctx.param("*"), Some("a/b/c.txt"));

    let mut ctx = router.context(Method::GET, "/");
    router.dispatch(&mut ctx).unwrap();
    assert_eq!(ctx.response().body.as_ref(), b"catch");
    assert_eq!(ctx.param("*"), Some(""));

    let mut ctx = router.context(Method::GET, "/some/where");
    router.dispatch(&mut ctx).unwrap();
    assert_eq!(ctx.param("*"), Some("some/where"));
}

#[test]
fn test_params_in_declaration_order() {
    let router = Router::new();
    router.get("/:a/:b/:c", [reply("abc")]).unwrap();
    let mut ctx = router.context(Method::GET, "/x/y/z");
    router.dispatch(&mut ctx).unwrap();
    let params: Vec<(&str, &str)> = ctx.params().collect();
    assert_eq!(params, vec![("a", "x"), ("b", "y"), ("c", "z")]);
}

#[test]
fn test_invalid_patterns_rejected() {
    let router = Router::new();
    assert!(matches!(
        router.get("/a/*/b", [reply("x")]),
        Err(RegistrationError::InvalidPattern { .. })
    ));
    assert!(matches!(
        router.get("/:id/:id", [reply("x")]),
        Err(RegistrationError::InvalidPattern { .. })
    ));
    let many: String = (0..31).map(|i| format!("/:p{i}")).collect();
    assert!(matches!(
        router.get(&many, [reply("x")]),
        Err(RegistrationError::TooManyParams { count: 31, .. })
    ));
}

#[test]
fn test_mount_exact_path_is_not_found_without_mount_traversal() {
    let sub = Router::new();
    sub.get("/ping", [reply("pong")]).unwrap();
    let router = Router::new();
    router.mount("/svc", sub).unwrap();

    let err = body_of(&router, Method::GET, "/svc/ping").unwrap_err();
    assert!(matches!(err, DispatchError::NotFound { .. }));

    let mut ctx = router.context(Method::GET, "/svc/ping");
    assert!(router.dispatch_mounted(&mut ctx).unwrap());
    assert_eq!(ctx.response().body.as_ref(), b"pong");
}

#[test]
fn test_concurrent_dispatch_during_registration() {
    let router = std::sync::Arc::new(Router::new());
    router.get("/stable", [reply("stable")]).unwrap();

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let router = std::sync::Arc::clone(&router);
            std::thread::spawn(move || {
                for _ in 0..500 {
                    assert_eq!(body_of(&router, Method::GET, "/stable").unwrap(), "stable");
                }
            })
        })
        .collect();
    for i in 0..100 {
        router.get(&format!("/late/{i}"), [reply("late")]).unwrap();
    }
    for r in readers {
        r.join().unwrap();
    }
    assert_eq!(body_of(&router, Method::GET, "/late/99").unwrap(), "late");
}

#[test]
fn test_camel_case_params_under_default_config() {
    let router = Router::new();
    router
        .get(
            "/Users/:userId",
            [triroute::dispatcher::handler(|ctx| {
                let id = ctx.param("userId").unwrap_or("missing").to_string();
                ctx.send_string(id);
                Ok(())
            })],
        )
        .unwrap()
        .name("user")
        .unwrap();

    assert_eq!(body_of(&router, Method::GET, "/users/42").unwrap(), "42");
    assert_eq!(body_of(&router, Method::GET, "/USERS/AbC").unwrap(), "AbC");
    let info = router.route_by_name("user").unwrap();
    assert_eq!(info.params, vec!["userId".to_string()]);
    assert_eq!(router.url_for("user", &[("userId", "7")]).unwrap(), "/users/7");
}
