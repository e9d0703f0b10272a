use std::sync::Once;

use ricci::{Context, Tensor};

static LOGGER: Once = Once::new();

/// A fresh session with test logging wired up.
pub fn ctx() -> Context {
    LOGGER.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
    Context::new()
}

/// Asserts equality up to dummy renaming against a parsed expectation.
#[allow(dead_code)]
pub fn assert_equiv(ctx: &Context, actual: &Tensor, expected: &str) {
    let want = ctx.parse(expected).unwrap();
    assert!(
        ctx.equivalent(actual, &want),
        "got {}, wanted {expected}",
        ctx.show(actual)
    );
}
