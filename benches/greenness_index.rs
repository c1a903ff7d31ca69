use canopy_greenness::color::GreennessCalculator;
use canopy_greenness::config::PatchConfig;
use canopy_greenness::patches::GridPatchSelector;
use canopy_greenness::{ChartQuad, GreennessMethod, IndexCalculator, PatchSelector};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use image::{GrayImage, Luma, Rgb, RgbImage};

/// Leaf/soil stripes so that both the filters and the median do real work
fn patch(size: u32) -> (RgbImage, GrayImage) {
    let image = RgbImage::from_fn(size, size, |x, y| {
        if (x / 8 + y / 8) % 2 == 0 {
            Rgb([40 + (x % 30) as u8, 150 + (y % 40) as u8, 50])
        } else {
            Rgb([120, 90, 70])
        }
    });
    let mask = GrayImage::from_fn(size, size, |x, y| {
        Luma([if (x / 8 + y / 8) % 2 == 0 { 255 } else { 0 }])
    });
    (image, mask)
}

fn benchmark_greenness_index(c: &mut Criterion) {
    let (image, mask) = patch(256);
    for method in [GreennessMethod::Exg, GreennessMethod::Ngrdi] {
        let calculator = GreennessCalculator::new(method);
        c.bench_function(&format!("greenness_{method:?}_256"), |b| {
            b.iter(|| calculator.compute(black_box(&image), black_box(&mask)))
        });
    }
}

fn benchmark_patch_selection(c: &mut Criterion) {
    let (image, _) = patch(512);
    let chart = ChartQuad::new([[0, 0], [120, 0], [120, 80], [0, 80]]);
    let selector = GridPatchSelector::new(&PatchConfig::default());
    c.bench_function("select_4_patches_512", |b| {
        b.iter(|| selector.select(black_box(&image), &chart, 4))
    });
}

criterion_group!(benches, benchmark_greenness_index, benchmark_patch_selection);
criterion_main!(benches);
