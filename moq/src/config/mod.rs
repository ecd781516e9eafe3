use moq_config::prelude::ParsedUserConfig;
use moq_router::{Router, RouterBuilder};

mod cli;
mod logging;

pub use cli::{Opts, SubCommands};
pub use logging::*;

pub fn build_router(container: &ParsedUserConfig) -> Result<Router, anyhow::Error> {
    let mut router_builder = RouterBuilder::new();
    for route_config in &container.routes {
        router_builder.load_config(route_config);
    }

    let router = router_builder
        .base_path(&container.root.server.base_path)
        .numeric_strings(container.root.responses.numeric_strings)
        .build()?;

    Ok(router)
}
