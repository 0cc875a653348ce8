#![allow(dead_code)]

use http::Method;
use triroute::dispatcher::{handler, Ctx, Handler};
use triroute::{DispatchError, Router};

/// Terminal handler answering with `body`.
pub fn reply(body: &'static str) -> Handler {
    handler(move |ctx: &mut Ctx| {
        ctx.send_string(body);
        Ok(())
    })
}

/// Middleware handler that only continues dispatch.
pub fn pass() -> Handler {
    handler(|ctx: &mut Ctx| ctx.next())
}

/// Handler appending `tag` to a `Trail` local, then continuing or answering.
pub fn trail(tag: &'static str, continue_dispatch: bool) -> Handler {
    handler(move |ctx: &mut Ctx| {
        let mut t = ctx.locals().get::<Trail>().cloned().unwrap_or_default();
        t.0.push(tag);
        ctx.locals_mut().insert(t.clone());
        if continue_dispatch {
            ctx.next()
        } else {
            ctx.send_string(t.0.join(","));
            Ok(())
        }
    })
}

#[derive(Debug, Clone, Default)]
pub struct Trail(pub Vec<&'static str>);

/// Dispatch and return the response body as a string.
pub fn body_of(router: &Router, method: Method, path: &str) -> Result<String, DispatchError> {
    let mut ctx = router.context(method, path);
    router.dispatch(&mut ctx)?;
    Ok(String::from_utf8_lossy(&ctx.response().body).into_owned())
}

pub mod fixtures {
    use std::fs;
    use tempfile::TempDir;

    /// A public directory with an index, a text file and a nested file.
    pub fn public_dir() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("index.html"), "<h1>index</h1>").unwrap();
        fs::write(dir.path().join("hello.txt"), "Hello\n").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub").join("file.txt"), "nested").unwrap();
        dir
    }
}
