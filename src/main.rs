use std::process::ExitCode;

use clap::Parser;
use eframe::egui;
use log::LevelFilter;

use huewash::app::HuewashApp;
use huewash::settings::AppSettings;
use huewash::{cli, i18n, logger};

fn main() -> ExitCode {
    let settings = AppSettings::load();

    // Initialize the internationalization system
    i18n::init();
    let language = if settings.language.is_empty() {
        i18n::detect_system_language()
    } else {
        settings.language.clone()
    };
    i18n::set_language(&language);

    // -- CLI / headless mode ---------------------------------------------
    if cli::CliArgs::is_cli_mode() {
        let args = cli::CliArgs::parse();
        if args.verbose {
            logger::init(LevelFilter::Debug, LevelFilter::Debug);
        } else {
            logger::init(settings.log_level, LevelFilter::Warn);
        }
        return cli::run(args, &settings);
    }

    // -- GUI mode -----------------------------------------------------
    logger::init(settings.log_level, LevelFilter::Warn);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1120.0, 680.0])
            .with_min_inner_size([900.0, 600.0])
            .with_title("Huewash"),
        ..Default::default()
    };

    match eframe::run_native(
        "Huewash",
        options,
        Box::new(move |cc| Box::new(HuewashApp::new(cc, settings))),
    ) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("GUI failed: {}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
