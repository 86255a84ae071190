pub mod crawl_route;
pub mod default_route;
pub mod export_route;
pub mod place_route;
