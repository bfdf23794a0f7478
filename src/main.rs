use anyhow::Result;
use clap::Parser;
use eframe::egui;

use slicescope::app::SliceScopeApp;
use slicescope::cli::Cli;
use slicescope::export;
use slicescope::pipeline::{self, PipelineOptions};
use slicescope::progress::PipelineProgress;

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let options = PipelineOptions::from_cli(&cli);
    let progress = PipelineProgress::new(cli.should_show_progress());
    let (dataset, model) = pipeline::run(&options, &progress)?;

    if let Some(dir) = &cli.export_dir {
        let files = export::export_dataset(&dataset, dir)?;
        log::info!("exported {files} files to {}", dir.display());
    }
    if cli.no_gui {
        return Ok(());
    }

    let native = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_min_inner_size([600.0, 400.0]),
        ..Default::default()
    };
    let export_dir = cli.export_dir.clone();
    eframe::run_native(
        "slicescope – curated vs predicted labels",
        native,
        Box::new(move |_cc| {
            let mut app = SliceScopeApp::new(dataset, model, options);
            app.state.export_dir = export_dir;
            Ok(Box::new(app))
        }),
    )
    .map_err(|e| anyhow::anyhow!("viewer error: {e}"))
}
