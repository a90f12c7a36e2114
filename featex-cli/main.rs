use featex_cli::{Config, FeaturePipeline};
use featex_extract::PerfCollector;
use image::{ImageReader, Rgba, RgbaImage};
use imageproc::drawing::draw_hollow_circle_mut;
use std::process::ExitCode;

fn main() -> ExitCode {
    let path = std::env::args().nth(1).unwrap_or_else(|| "input.png".to_string());

    // Load grayscale image
    let reader = match ImageReader::open(&path) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Failed to open {}: {}", path, e);
            return ExitCode::FAILURE;
        }
    };
    let img = match reader.decode() {
        Ok(decoded) => decoded.to_luma8(),
        Err(e) => {
            eprintln!("Failed to decode {}: {}", path, e);
            return ExitCode::FAILURE;
        }
    };

    let (w, h) = img.dimensions();
    let mut pipeline = match FeaturePipeline::with_fast_backend(Config::default()) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to set up pipeline: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Run the full pipeline with stage timings
    let mut perf = PerfCollector::new();
    let (kps, desc) =
        match pipeline.extract_with_perf(img.as_raw(), w as usize, h as usize, &mut perf) {
            Ok(out) => out,
            Err(e) => {
                eprintln!("Extraction failed: {}", e);
                return ExitCode::FAILURE;
            }
        };

    println!("Extracted {} keypoints across {} levels", kps.len(), pipeline.config().n_levels);
    println!("Generated {} descriptors", desc.len());
    println!("{}", perf.summary());

    // Convert image to RGBA for drawing
    let mut output: RgbaImage = image::DynamicImage::ImageLuma8(img).into_rgba8();

    // Circle radius grows with pyramid level
    for kp in &kps {
        draw_hollow_circle_mut(
            &mut output,
            (kp.x as i32, kp.y as i32),
            3 + kp.level as i32,
            Rgba([255, 0, 0, 255]),
        );
    }

    let out_path = format!("{}_keypoints.png", path.trim_end_matches(".png"));
    if let Err(e) = output.save(&out_path) {
        eprintln!("Failed to save output image: {}", e);
        return ExitCode::FAILURE;
    }
    println!("Saved result image as {}", out_path);

    ExitCode::SUCCESS
}
