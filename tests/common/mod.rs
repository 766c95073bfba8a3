#![allow(dead_code)]

pub use buildwatch_test_utils::builders::{BuildDecl, Project};
pub use buildwatch_test_utils::{init_tracing, wait_until, with_timeout, Harness};

use std::sync::Arc;

use buildwatch::config::{BuildConfig, CliInput};

/// A project with one build, `dev`, whose entry point `app.core` lives in
/// `src/app/core.cljs`.
pub fn dev_project() -> Project {
    let project = Project::new();
    project.write("src/app/core.cljs", "(ns app.core)\n");
    project.write("src/app/util.cljs", "(ns app.util)\n");
    project.write_build(&dev_decl());
    project
}

pub fn dev_decl() -> BuildDecl {
    BuildDecl::new("dev")
        .main("app.core")
        .meta("debounce-ms", 30i64)
}

/// Resolve `id` with default CLI input.
pub fn resolve(project: &Project, id: &str) -> Arc<BuildConfig> {
    Arc::new(
        project
            .base(CliInput::default())
            .resolve_build(id)
            .expect("resolve build"),
    )
}
