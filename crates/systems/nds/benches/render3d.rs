use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use emu_core::graphics::FragmentColor;
use emu_nds::{
    convert_framebuffer, ClearImageBuffers, ColorFormat, TextureDeposterizer, NATIVE_PIXELS,
    TEXTURE_SLOT_TEXELS,
};

/// Deterministic pixel noise
fn noise(count: usize) -> Vec<u32> {
    let mut state = 0x2545_F491u32;
    (0..count)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            state
        })
        .collect()
}

fn bench_flush(c: &mut Criterion) {
    let mut group = c.benchmark_group("render3d_flush");

    for scale in [1usize, 2, 4].iter() {
        let pixels = NATIVE_PIXELS * scale * scale;
        let src: Vec<FragmentColor> = noise(pixels)
            .into_iter()
            .map(|w| FragmentColor::from_word(w & 0x1F3F_3F3F))
            .collect();
        let mut dst = vec![FragmentColor::default(); pixels];
        let mut packed = vec![0u16; pixels];

        group.bench_with_input(BenchmarkId::new("6665_to_8888", scale), scale, |b, _| {
            b.iter(|| {
                convert_framebuffer(
                    black_box(&src),
                    ColorFormat::Bgr666Rev,
                    ColorFormat::Bgr888Rev,
                    pixels,
                    Some(&mut dst),
                    None,
                )
                .unwrap();
                black_box(dst[0]);
            });
        });

        group.bench_with_input(BenchmarkId::new("6665_to_5551", scale), scale, |b, _| {
            b.iter(|| {
                convert_framebuffer(
                    black_box(&src),
                    ColorFormat::Bgr666Rev,
                    ColorFormat::Bgr666Rev,
                    pixels,
                    None,
                    Some(&mut packed),
                )
                .unwrap();
                black_box(packed[0]);
            });
        });
    }

    group.finish();
}

fn bench_deposterize(c: &mut Criterion) {
    let mut group = c.benchmark_group("render3d_deposterize");
    let mut filter = TextureDeposterizer::new();

    for size in [64usize, 256, 1024].iter() {
        // Opaque texels with small channel steps, the case the filter targets
        let src: Vec<u32> = noise(size * size)
            .into_iter()
            .map(|w| 0xFF00_0000 | (w & 0x000F_0F0F))
            .collect();

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                let out = filter.deposterize(black_box(&src), size, size).unwrap();
                black_box(out[0]);
            });
        });
    }

    group.finish();
}

fn bench_clear_image(c: &mut Criterion) {
    let color: Vec<u16> = noise(TEXTURE_SLOT_TEXELS).iter().map(|&w| w as u16).collect();
    let depth: Vec<u16> = noise(TEXTURE_SLOT_TEXELS)
        .iter()
        .map(|&w| (w >> 16) as u16)
        .collect();
    let mut buffers = ClearImageBuffers::new();

    let mut group = c.benchmark_group("render3d_clear_image");

    group.bench_function("unscrolled", |b| {
        b.iter(|| {
            buffers.fill(&color, &depth, 0, 0).unwrap();
            black_box(buffers.depth[0]);
        });
    });

    group.bench_function("scrolled", |b| {
        b.iter(|| {
            buffers.fill(&color, &depth, 0x4020, 0).unwrap();
            black_box(buffers.depth[0]);
        });
    });

    group.finish();
}

criterion_group!(benches, bench_flush, bench_deposterize, bench_clear_image);
criterion_main!(benches);
