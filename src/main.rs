use clap::Parser;
use std::process::ExitCode;
use tex_dim_bench::{
    benchmark::Benchmark,
    config::Args,
    report::Report,
    vulkan_util::{InstanceSetup, VulkanData},
    window::{is_exit_request, BenchWindow, Presenter},
};
use winit::{event::Event, event_loop::EventLoop};

fn main() -> ExitCode {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("warn,tex_dim_bench=info"),
    )
    .init();

    let args = Args::parse();
    let result = if args.headless {
        run_headless(&args)
    } else {
        run_windowed(args)
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:?}");
            ExitCode::FAILURE
        },
    }
}

fn finish(args: &Args, report: &Report) -> anyhow::Result<()> {
    print!("{report}");
    if let Some(path) = &args.output {
        report.write_json(path)?;
        log::info!("Wrote report to {}", path.display());
    }
    Ok(())
}

fn run_headless(args: &Args) -> anyhow::Result<()> {
    let mut vulkan = VulkanData::headless(args.validation)?;
    let benchmark = Benchmark::new(&mut vulkan, args.benchmark_config())?;
    let report = benchmark.run(&vulkan)?;
    finish(args, &report)
}

fn run_windowed(args: Args) -> anyhow::Result<()> {
    let config = args.benchmark_config();
    config.validate()?;

    let event_loop = EventLoop::new();
    let setup = InstanceSetup::new(true, args.validation)?;
    let window = BenchWindow::new(
        &event_loop,
        setup.instance.clone(),
        config.viewport_size(),
        args.maximized,
    )?;
    let mut vulkan = VulkanData::init(setup, Some(&window.surface))?;
    let presenter = Presenter::new(&vulkan, &window)?;
    let benchmark = Benchmark::new(&mut vulkan, config)?;

    let mut finished = false;
    event_loop.run(move |event, _, control| match event {
        Event::WindowEvent { event, .. } if is_exit_request(&event) => control.set_exit(),
        Event::MainEventsCleared if !finished => {
            finished = true;
            let result = benchmark
                .run(&vulkan)
                .and_then(|report| finish(&args, &report))
                .and_then(|()| presenter.present(&vulkan, benchmark.target()));
            match result {
                Ok(()) if args.hold => control.set_wait(),
                Ok(()) => control.set_exit(),
                Err(e) => {
                    log::error!("{e:?}");
                    control.set_exit_with_code(1);
                },
            }
        },
        _ => {},
    })
}
