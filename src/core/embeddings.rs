use image::{imageops::FilterType, DynamicImage};

use crate::error::Result;
use crate::state::VisionConfig;

/// Length of the pooled feature vector produced by ResNet-50.
pub const RESNET50_FEATURE_DIM: usize = 2048;

/// Turns an image into a fixed-length feature vector.
///
/// Implementations are called once per query image, from a blocking worker
/// thread.
pub trait ImageEncoder: Send + Sync + std::fmt::Debug {
    /// Compute the embedding for one image.
    fn encode(&self, image: &DynamicImage) -> Result<Vec<f32>>;

    /// Length of the vectors this encoder produces, when known up front.
    fn dimension(&self) -> Option<usize> {
        None
    }
}

/// Resize, scale and normalize an image into a CHW float buffer.
///
/// The layout is `[channel][row][column]` with channels in RGB order, which
/// is what torchvision-style backbones expect.
pub fn preprocess(img: &DynamicImage, vision: &VisionConfig) -> Vec<f32> {
    let (width, height) = (vision.target_width, vision.target_height);
    let rgb_img = img
        .resize_exact(width, height, FilterType::Triangle)
        .to_rgb8();

    let plane = (width * height) as usize;
    let mut data = vec![0.0f32; plane * 3];

    for (x, y, pixel) in rgb_img.enumerate_pixels() {
        let offset = (y * width + x) as usize;
        for channel in 0..3 {
            let scaled = pixel[channel] as f32 / 255.0;
            data[channel * plane + offset] = (scaled - vision.mean[channel]) / vision.std[channel];
        }
    }

    data
}

#[cfg(feature = "embeddings")]
pub use self::resnet::ResnetEncoder;

#[cfg(feature = "embeddings")]
mod resnet {
    use std::sync::Mutex;

    use image::DynamicImage;
    use tch::{nn, nn::ModuleT, Device, Tensor};

    use super::{preprocess, ImageEncoder, RESNET50_FEATURE_DIM};
    use crate::error::{AppError, Result, ResultExt};
    use crate::state::VisionConfig;

    struct Backbone {
        _vars: nn::VarStore,
        model: nn::FuncT<'static>,
    }

    /// ResNet-50 without its classification head, run through libtorch.
    pub struct ResnetEncoder {
        backbone: Mutex<Backbone>,
        device: Device,
        vision: VisionConfig,
    }

    impl std::fmt::Debug for ResnetEncoder {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("ResnetEncoder")
                .field("device", &self.device)
                .field("vision", &self.vision)
                .finish()
        }
    }

    impl ResnetEncoder {
        /// Load pretrained weights from `vision.weights_path`.
        ///
        /// Uses CUDA when libtorch reports a device, otherwise the CPU.
        pub fn load(vision: &VisionConfig) -> Result<Self> {
            let path = vision.weights_path.as_ref().ok_or_else(|| {
                AppError::Config("STYLEFINDER_WEIGHTS must point to ResNet-50 weights".to_string())
            })?;

            let device = Device::cuda_if_available();
            let mut vars = nn::VarStore::new(device);
            let model = tch::vision::resnet::resnet50_no_final_layer(&vars.root());
            vars.load(path)
                .with_context(|| format!("loading weights from {}", path.display()))?;

            log::info!("Loaded ResNet-50 backbone on {:?}", device);

            Ok(Self {
                backbone: Mutex::new(Backbone { _vars: vars, model }),
                device,
                vision: vision.clone(),
            })
        }
    }

    impl ImageEncoder for ResnetEncoder {
        fn encode(&self, image: &DynamicImage) -> Result<Vec<f32>> {
            let data = preprocess(image, &self.vision);
            let input = Tensor::of_slice(&data)
                .reshape(&[
                    1,
                    3,
                    self.vision.target_height as i64,
                    self.vision.target_width as i64,
                ])
                .to_device(self.device);

            let backbone = self
                .backbone
                .lock()
                .map_err(|_| AppError::Internal("encoder lock poisoned".to_string()))?;
            let output = tch::no_grad(|| backbone.model.forward_t(&input, false));
            drop(backbone);

            let flat = output.to_device(Device::Cpu).reshape(&[-1]);
            Ok(Vec::<f32>::try_from(&flat)?)
        }

        fn dimension(&self) -> Option<usize> {
            Some(RESNET50_FEATURE_DIM)
        }
    }

}
