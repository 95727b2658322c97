use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use tex_dim_bench::{
    benchmark::Benchmark,
    config::{BenchmarkConfig, FilterMode},
    dimensionality::Dimensionality,
    vulkan_util::VulkanData,
};

fn criterion_benchmark(c: &mut Criterion) {
    let mut vulkan = VulkanData::headless(false).unwrap();

    for filter in [FilterMode::Linear, FilterMode::Nearest] {
        let mut g = c.benchmark_group(format!("lookup_batch_{:?}", filter));
        g.sample_size(10);

        for texels in [128, 1024] {
            let benchmark = Benchmark::new(
                &mut vulkan,
                BenchmarkConfig {
                    frames_per_batch: 250,
                    texels,
                    filter,
                    ..Default::default()
                },
            )
            .unwrap();
            assert!(benchmark.outputs_match(&vulkan).unwrap());

            for dim in Dimensionality::ALL {
                g.bench_with_input(BenchmarkId::new(dim.label(), texels), &dim, |b, dim| {
                    b.iter(|| benchmark.run_batch(&vulkan, *dim).unwrap());
                });
            }
        }
    }

    {
        let mut g = c.benchmark_group("submit_and_wait");
        g.bench_function("empty", |b| {
            b.iter(|| {
                let command_buffer = vulkan
                    .create_command_buffer(
                        vulkano::command_buffer::CommandBufferUsage::OneTimeSubmit,
                    )
                    .unwrap()
                    .build()
                    .unwrap();
                vulkan.submit_and_wait(command_buffer).unwrap();
            })
        });
    }
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
