use console::Style;
use microstack_core::pipeline::config::PipelineConfig;

struct Styles {
    title: Style,
    header: Style,
    label: Style,
    value: Style,
    method: Style,
    disabled: Style,
    path: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            header: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            method: Style::new().green(),
            disabled: Style::new().dim().yellow(),
            path: Style::new().underlined(),
        }
    }

    fn row(&self, label: &str, value: impl std::fmt::Display) {
        println!("    {:<12}{}", self.label.apply_to(label), self.value.apply_to(value));
    }

    fn off(&self, header: &str) {
        println!(
            "  {:<14}{}",
            self.header.apply_to(header),
            self.disabled.apply_to("disabled")
        );
        println!();
    }
}

pub fn print_pipeline_summary(config: &PipelineConfig) {
    let s = Styles::new();

    println!();
    println!("  {}", s.title.apply_to("MicroStack Pipeline"));
    println!("  {}", s.title.apply_to("\u{2550}".repeat(19)));
    println!();

    println!(
        "  {:<14}{}",
        s.label.apply_to("Input"),
        s.path.apply_to(config.input.display())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Output"),
        s.path.apply_to(config.output.display())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Export"),
        s.method.apply_to(format!(
            "{}{}",
            config.export.bit_depth,
            if config.export.rescale { ", rescaled" } else { "" }
        ))
    );
    println!();

    let cal = &config.calibration;
    println!("  {}", s.header.apply_to("Calibration"));
    s.row("Space", format!("{} {}/px", cal.space_scale, cal.space_unit));
    s.row("Time", format!("{} {}/frame", cal.time_scale, cal.time_unit));
    println!();

    if let Some(ref range) = config.frame_range {
        println!("  {}", s.header.apply_to("Frames"));
        let last = range.last.map(|l| l.to_string()).unwrap_or_else(|| "end".into());
        s.row("Range", format!("{}..{}", range.first, last));
        println!();
    }

    match config.background {
        Some(ref bg) => {
            println!("  {}", s.header.apply_to("Background"));
            s.row("Average", bg.average);
            s.row("Correction", bg.correction);
            if bg.signed_bits {
                s.row("Signed", "yes");
            }
            println!();
        }
        None => s.off("Background"),
    }

    match config.contrast {
        Some(ref contrast) => {
            println!("  {}", s.header.apply_to("Contrast"));
            let p = &contrast.params;
            match (p.min, p.max) {
                (Some(min), Some(max)) => s.row("Limits", format!("{min} .. {max}")),
                _ => s.row("Percentile", format!("{}%", p.percentile)),
            }
            println!();
        }
        None => s.off("Contrast"),
    }

    if let Some(ref crop) = config.crop {
        println!("  {}", s.header.apply_to("Crop"));
        s.row("From", format!("{:?}", crop.top_left));
        match crop.bottom_right {
            Some(br) => s.row("To", format!("{br:?}")),
            None => s.row("To", "frame edge"),
        }
        println!();
    }

    match config.scale_bar {
        Some(ref bar) => {
            println!("  {}", s.header.apply_to("Scale Bar"));
            s.row("Length", format!("{} {}", bar.params.scale_length, cal.space_unit));
            s.row("Font", &bar.params.font);
            println!();
        }
        None => s.off("Scale Bar"),
    }

    match config.time_stamps {
        Some(ref stamps) => {
            println!("  {}", s.header.apply_to("Time Stamps"));
            s.row("Position", stamps.position);
            s.row("Font", &stamps.font);
            println!();
        }
        None => s.off("Time Stamps"),
    }

    if let Some(ref montage) = config.montage {
        println!("  {}", s.header.apply_to("Montage"));
        s.row("Frames", format!("{:?}", montage.frames));
        s.row("Margin", format!("{} px", montage.margin));
        println!();
    }

    if let Some(ref video) = config.video {
        println!("  {}", s.header.apply_to("Video"));
        s.row("Codec", &video.codec);
        s.row("FPS", video.fps);
        println!();
    }
    println!();
}
