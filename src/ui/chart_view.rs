use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use eframe::egui;
use eframe::egui_wgpu;
use egui_plot::{Bar, BarChart, GridMark, Plot};
use crate::processing::report::ChartEntry;
use crate::state::theme::Theme;

pub const CHART_TITLE: &str = "Subject-wise Statistics";

#[derive(Debug, thiserror::Error)]
pub enum ViewerError {
    #[error("chart window failed: {0}")]
    Window(String),
    #[error("failed to export chart to {path:?}: {reason}")]
    Export { path: PathBuf, reason: String },
}

#[derive(Debug, Clone, Default)]
pub struct ViewerOptions {
    pub theme: Theme,
    /// Save a PNG of the chart once it has been drawn.
    pub export_path: Option<PathBuf>,
    /// Close the window right after the export is written.
    pub close_after_export: bool,
}

type ExportSlot = Arc<Mutex<Option<Result<PathBuf, String>>>>;

/// Frames to draw before requesting the screenshot, so the plot has laid out.
const SETTLE_FRAMES: u64 = 3;

/// Window showing one bar per chart entry.
pub struct ChartViewer {
    entries: Vec<ChartEntry>,
    theme: Theme,
    export_path: Option<PathBuf>,
    close_after_export: bool,
    export_result: ExportSlot,
    screenshot_requested: bool,
    frames: u64,
    /// Plot area of the last frame, used to crop the screenshot.
    last_chart_rect: Option<egui::Rect>,
}

impl ChartViewer {
    fn new(cc: &eframe::CreationContext<'_>, entries: Vec<ChartEntry>, options: ViewerOptions, export_result: ExportSlot) -> Self {
        let ctx = &cc.egui_ctx;
        let mut style = (*ctx.style()).clone();
        style.text_styles.insert(egui::TextStyle::Body, egui::FontId::proportional(15.0));
        style.text_styles.insert(egui::TextStyle::Heading, egui::FontId::proportional(22.0));
        style.text_styles.insert(egui::TextStyle::Small, egui::FontId::proportional(12.0));
        ctx.set_style(style);
        ctx.set_visuals(options.theme.visuals());

        Self {
            entries,
            theme: options.theme,
            export_path: options.export_path,
            close_after_export: options.close_after_export,
            export_result,
            screenshot_requested: false,
            frames: 0,
            last_chart_rect: None,
        }
    }

    fn bars(&self) -> Vec<Bar> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, e)| {
                Bar::new(i as f64, e.value)
                    .name(&e.label)
                    .width(0.8)
                    .fill(self.theme.bar_fill())
                    .stroke(egui::Stroke::new(1.0, self.theme.bar_outline()))
            })
            .collect()
    }

    fn show_chart(&mut self, ui: &mut egui::Ui) {
        ui.vertical_centered(|ui| ui.heading(CHART_TITLE));
        ui.add_space(4.0);

        let labels: Vec<String> = self.entries.iter().map(|e| e.label.clone()).collect();
        let chart = BarChart::new(self.bars())
            .name("Statistics")
            .element_formatter(Box::new(|bar: &Bar, _chart: &BarChart| {
                format!("{}\n{:.3}", bar.name, bar.value)
            }));

        let response = Plot::new("subject_stats")
            .x_axis_label("Metrics")
            .y_axis_label("Values")
            .x_grid_spacer(egui_plot::uniform_grid_spacer(|_| [1.0, 1.0, 1.0]))
            .x_axis_formatter(move |mark: GridMark, _range: &std::ops::RangeInclusive<f64>| {
                tick_label(&labels, mark.value)
            })
            .allow_drag(false)
            .allow_zoom(false)
            .allow_scroll(false)
            .include_y(0.0)
            .show_background(true)
            .show(ui, |plot_ui| plot_ui.bar_chart(chart));

        self.last_chart_rect = Some(response.response.rect);
    }

    fn handle_export(&mut self, ctx: &egui::Context) {
        let Some(path) = self.export_path.clone() else {
            return;
        };

        if !self.screenshot_requested {
            if self.frames >= SETTLE_FRAMES {
                ctx.send_viewport_cmd(egui::ViewportCommand::Screenshot(egui::UserData::default()));
                self.screenshot_requested = true;
            }
            ctx.request_repaint();
            return;
        }

        let mut screenshot: Option<Arc<egui::ColorImage>> = None;
        ctx.input(|i| {
            for event in &i.raw.events {
                if let egui::Event::Screenshot { image, .. } = event {
                    screenshot = Some(image.clone());
                }
            }
        });
        let Some(color_image) = screenshot else {
            ctx.request_repaint();
            return;
        };

        let (rgba, width, height) = crop_rgba(&color_image, self.last_chart_rect, ctx.pixels_per_point());
        let result = match image::RgbaImage::from_raw(width as u32, height as u32, rgba) {
            Some(img) => img.save(&path).map(|_| path.clone()).map_err(|e| e.to_string()),
            None => Err("screenshot buffer has the wrong size".to_string()),
        };
        match &result {
            Ok(p) => tracing::info!("Exported chart to {:?}", p),
            Err(e) => tracing::error!("Failed to export chart: {e}"),
        }
        if let Ok(mut slot) = self.export_result.lock() {
            *slot = Some(result);
        }
        self.export_path = None;

        if self.close_after_export {
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
        }
    }
}

impl eframe::App for ChartViewer {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        egui::CentralPanel::default()
            .frame(egui::Frame::central_panel(&ctx.style()).fill(self.theme.plot_bg()))
            .show(ctx, |ui| self.show_chart(ui));
        self.frames += 1;
        self.handle_export(ctx);
    }
}

/// Axis label for the bar at integer position `x`, empty between bars.
pub fn tick_label(labels: &[String], x: f64) -> String {
    let idx = x.round();
    if (x - idx).abs() > 1e-6 || idx < 0.0 {
        return String::new();
    }
    labels.get(idx as usize).cloned().unwrap_or_default()
}

/// Copy the pixels inside `rect` (in points) out of a screenshot as RGBA.
/// The whole image is returned when there is no rect.
pub fn crop_rgba(image: &egui::ColorImage, rect: Option<egui::Rect>, ppp: f32) -> (Vec<u8>, usize, usize) {
    let full_w = image.width();
    let full_h = image.height();
    let Some(rect) = rect else {
        let rgba = image.pixels.iter().flat_map(|c| [c.r(), c.g(), c.b(), c.a()]).collect();
        return (rgba, full_w, full_h);
    };

    let x0 = ((rect.left() * ppp).max(0.0) as usize).min(full_w);
    let y0 = ((rect.top() * ppp).max(0.0) as usize).min(full_h);
    let x1 = ((rect.right() * ppp).ceil() as usize).min(full_w);
    let y1 = ((rect.bottom() * ppp).ceil() as usize).min(full_h);
    let cw = x1.saturating_sub(x0);
    let ch = y1.saturating_sub(y0);
    let mut cropped = Vec::with_capacity(cw * ch * 4);
    for row in y0..y1 {
        for col in x0..x1 {
            let c = image.pixels[row * full_w + col];
            cropped.extend_from_slice(&[c.r(), c.g(), c.b(), c.a()]);
        }
    }
    (cropped, cw, ch)
}

/// Open the chart window and block until it is closed. Returns the path of
/// the exported PNG when an export was requested and succeeded.
pub fn render(entries: Vec<ChartEntry>, options: ViewerOptions) -> Result<Option<PathBuf>, ViewerError> {
    let wanted = options.export_path.clone();
    tracing::debug!("Opening chart with {} bars, {} theme", entries.len(), options.theme.label());
    let export_result: ExportSlot = Arc::new(Mutex::new(None));
    let slot = Arc::clone(&export_result);

    let native = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(CHART_TITLE)
            .with_inner_size([1200.0, 600.0])
            .with_min_inner_size([640.0, 360.0]),
        renderer: eframe::Renderer::Wgpu,
        wgpu_options: egui_wgpu::WgpuConfiguration {
            present_mode: eframe::wgpu::PresentMode::AutoVsync,
            ..Default::default()
        },
        ..Default::default()
    };

    eframe::run_native(
        CHART_TITLE,
        native,
        Box::new(move |cc| Ok(Box::new(ChartViewer::new(cc, entries, options, slot)))),
    )
    .map_err(|e| ViewerError::Window(e.to_string()))?;

    let outcome = export_result.lock().ok().and_then(|mut s| s.take());
    match (wanted, outcome) {
        (None, _) => Ok(None),
        (Some(_), Some(Ok(path))) => Ok(Some(path)),
        (Some(path), Some(Err(reason))) => Err(ViewerError::Export { path, reason }),
        (Some(path), None) => Err(ViewerError::Export {
            path,
            reason: "window closed before the chart was captured".to_string(),
        }),
    }
}
