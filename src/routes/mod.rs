pub mod info_routes;
pub mod view_routes;
pub mod ws_handler;
