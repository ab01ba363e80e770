use firefly_viewer::ViewerConfig;

fn main() {
    // info+ unless RUST_LOG overrides; GPU backends are noisy below warn
    let default = "info,firefly_viewer=info,wgpu_hal=warn,wgpu_core=warn,wgpu=warn,naga=warn";
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp_secs()
        .try_init();

    let config = match std::env::args().nth(1) {
        Some(root) => ViewerConfig::new().asset_root(root),
        None => ViewerConfig::new(),
    };

    if let Err(e) = firefly_viewer::run(config) {
        log::error!("{e:#}");
        std::process::exit(1);
    }
}
