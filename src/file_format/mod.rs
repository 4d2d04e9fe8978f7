pub mod dashboard_config;
pub mod ordered_map;
pub mod template_info;
