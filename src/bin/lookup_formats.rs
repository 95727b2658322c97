use clap::Parser;
use tex_dim_bench::{dimensionality::Dimensionality, vulkan_util::VulkanData};
use vulkano::{
    format::{Format, FormatFeatures},
    image::{ImageFormatInfo, ImageTiling, ImageType, ImageUsage},
};

/// Lists which lookup formats a device can sample as 1D and 2D images.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(long, default_value_t = false)]
    validation: bool,
}

fn image_type(dim: Dimensionality) -> ImageType {
    match dim {
        Dimensionality::OneD => ImageType::Dim1d,
        Dimensionality::TwoD => ImageType::Dim2d,
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    let vulkan = VulkanData::headless(args.validation)?;
    println!("{}", vulkan.device_name());

    let formats = [
        Format::R8G8B8_UNORM,
        Format::R8G8B8A8_UNORM,
        Format::B8G8R8A8_UNORM,
        Format::R8G8B8A8_SRGB,
        Format::R16G16B16A16_SFLOAT,
        Format::R32G32B32A32_SFLOAT,
    ];

    for format in formats {
        let features = vulkan
            .physical_device
            .format_properties(format)?
            .optimal_tiling_features;
        let flag = |feature: FormatFeatures, name: &'static str| {
            if features.contains(feature) {
                name
            } else {
                ""
            }
        };

        for dim in Dimensionality::ALL {
            let supported = vulkan
                .physical_device
                .image_format_properties(ImageFormatInfo {
                    format: Some(format),
                    image_type: image_type(dim),
                    usage: ImageUsage::SAMPLED | ImageUsage::TRANSFER_DST,
                    tiling: ImageTiling::Optimal,
                    ..Default::default()
                })?;

            match supported {
                Some(props) => println!(
                    "{: <22} - {} - X max extent {:?}, {} mip levels {} {} {}",
                    format!("{:?}", format),
                    dim,
                    props.max_extent,
                    props.max_mip_levels,
                    flag(FormatFeatures::SAMPLED_IMAGE_FILTER_LINEAR, "linear"),
                    flag(FormatFeatures::BLIT_SRC, "blit-src"),
                    flag(FormatFeatures::BLIT_DST, "blit-dst"),
                ),
                None => println!("{: <22} - {} - _", format!("{:?}", format), dim),
            }
        }
    }

    Ok(())
}
