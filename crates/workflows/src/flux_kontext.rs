//! FLUX-Kontext pipeline: masked-compose generation with prompts
//! written by a vision-language model.
//!
//! Per job: describe the plush with the VLM, splice the description
//! into the X-ray style template, condition a single FLUX sampling
//! pass on a depth map of the background-removed input, then frame and
//! caption the decoded result.

use txr_engine::{value_at, Device, EngineValue, NodeInputs};

use crate::error::WorkflowError;
use crate::ops::{self, noise_seed};
use crate::prompts;
use crate::workflow::{GenerateRequest, Workflow, WorkflowContext};

const VAE_FILE: &str = "diffusion_pytorch_model.safetensors";
const CHECKPOINT_FILE: &str = "flux1-kontext-dev.safetensors";
const VLM_MODEL: &str = "deepseek-ai/Janus-Pro-1B";
const CLIP_L_FILE: &str = "clip_l.safetensors";
const T5_FILE: &str = "t5/t5xxl_fp16.safetensors";
const CONTROL_NET_FILE: &str =
    "FLUX.1/Shakker-Labs-ControlNet-Union-Pro/diffusion_pytorch_model.safetensors";
const DEPTH_CHECKPOINT: &str = "depth_anything_vitl14.pth";

/// Job-independent handles produced by `load_once`.
#[derive(Debug, Clone)]
struct FluxKontextConfig {
    vae: EngineValue,
    model: EngineValue,
    vlm_model: EngineValue,
    vlm_processor: EngineValue,
    clip: EngineValue,
    control_net: EngineValue,
}

pub struct FluxKontext {
    ctx: WorkflowContext,
    config: Option<FluxKontextConfig>,
}

impl FluxKontext {
    pub const NAME: &'static str = "FLUX_Kontext";

    pub fn new(ctx: WorkflowContext) -> Self {
        Self { ctx, config: None }
    }
}

impl Workflow for FluxKontext {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn device(&self) -> Device {
        self.ctx.device
    }

    fn is_loaded(&self) -> bool {
        self.config.is_some()
    }

    fn load_once(&mut self) -> Result<(), WorkflowError> {
        let ctx = &self.ctx;
        tracing::info!(workflow = Self::NAME, device = %ctx.device, "Loading models");

        let vae = ctx.invoke(ops::VAE_LOADER, NodeInputs::new().with("vae_name", VAE_FILE))?;

        let checkpoint = ctx.invoke(
            ops::CHECKPOINT_LOADER,
            NodeInputs::new().with("ckpt_name", CHECKPOINT_FILE),
        )?;

        let vlm = ctx.invoke(
            ops::VLM_LOADER,
            NodeInputs::new().with("model_name", VLM_MODEL),
        )?;

        let clip = ctx.invoke(
            ops::DUAL_CLIP_LOADER,
            NodeInputs::new()
                .with("clip_name1", CLIP_L_FILE)
                .with("clip_name2", T5_FILE)
                .with("type", "flux")
                .with("device", "default"),
        )?;

        let control_net = ctx.invoke(
            ops::CONTROL_NET_LOADER,
            NodeInputs::new().with("control_net_name", CONTROL_NET_FILE),
        )?;

        self.config = Some(FluxKontextConfig {
            vae: value_at(&vae, 0)?.clone(),
            model: value_at(&checkpoint, 0)?.clone(),
            vlm_model: value_at(&vlm, 0)?.clone(),
            vlm_processor: value_at(&vlm, 1)?.clone(),
            clip: value_at(&clip, 0)?.clone(),
            control_net: value_at(&control_net, 0)?.clone(),
        });
        Ok(())
    }

    fn generate(&self, request: &GenerateRequest<'_>) -> Result<Vec<u8>, WorkflowError> {
        let cfg = self
            .config
            .as_ref()
            .ok_or(WorkflowError::NotLoaded(Self::NAME))?;
        let ctx = &self.ctx;

        // Staged file must outlive the load op's downstream readers.
        let (_staged, input) = ops::load_input_image(ctx, request.image)?;
        let resized = ops::resize(ctx, value_at(&input, 0)?, 1024, 1024)?;

        // Prompt: factual VLM description + fixed style template.
        let description = ctx.invoke(
            ops::VLM_UNDERSTAND,
            NodeInputs::new()
                .with("question", prompts::VLM_DESCRIBE_QUESTION)
                .with("seed", noise_seed())
                .with("temperature", 0.3)
                .with("top_p", 0.9)
                .with("max_new_tokens", 128)
                .with("model", &cfg.vlm_model)
                .with("processor", &cfg.vlm_processor)
                .with("image", value_at(&resized, 0)?),
        )?;
        let template = ctx.invoke(
            ops::TEXT_MULTILINE,
            NodeInputs::new().with("text", prompts::XRAY_STYLE_TEMPLATE),
        )?;
        let prompt = ctx.invoke(
            ops::STRING_CONCATENATE,
            NodeInputs::new()
                .with("string_a", value_at(&description, 0)?)
                .with("string_b", value_at(&template, 0)?)
                .with("delimiter", ""),
        )?;
        let positive = ops::encode_text(ctx, value_at(&prompt, 0)?, &cfg.clip)?;
        let negative = ops::encode_text(ctx, prompts::FLUX_NEGATIVE, &cfg.clip)?;

        // Depth conditioning over the background-removed input.
        let cutout = ops::remove_background(ctx, value_at(&resized, 0)?, "u2netp", "white", false, true)?;
        let latent = ctx.invoke(
            ops::VAE_ENCODE,
            NodeInputs::new()
                .with("pixels", value_at(&cutout, 0)?)
                .with("vae", &cfg.vae),
        )?;
        let depth = ops::depth_map(ctx, value_at(&cutout, 0)?, DEPTH_CHECKPOINT)?;

        let conditioned = ctx.invoke(
            ops::CONTROL_NET_APPLY,
            NodeInputs::new()
                .with("strength", 0.85)
                .with("start_percent", 0)
                .with("end_percent", 1)
                .with("positive", value_at(&positive, 0)?)
                .with("negative", value_at(&negative, 0)?)
                .with("control_net", &cfg.control_net)
                .with("image", value_at(&depth, 0)?)
                .with("vae", &cfg.vae),
        )?;
        let guided_positive = ctx.invoke(
            ops::FLUX_GUIDANCE,
            NodeInputs::new()
                .with("guidance", 7)
                .with("conditioning", value_at(&conditioned, 0)?),
        )?;
        let guided_negative = ctx.invoke(
            ops::FLUX_GUIDANCE,
            NodeInputs::new()
                .with("guidance", 1)
                .with("conditioning", value_at(&conditioned, 1)?),
        )?;

        let sampled = ctx.invoke(
            ops::KSAMPLER,
            NodeInputs::new()
                .with("seed", noise_seed())
                .with("steps", 20)
                .with("cfg", 1)
                .with("sampler_name", "euler")
                .with("scheduler", "normal")
                .with("denoise", 1)
                .with("model", &cfg.model)
                .with("positive", value_at(&guided_positive, 0)?)
                .with("negative", value_at(&guided_negative, 0)?)
                .with("latent_image", value_at(&latent, 0)?),
        )?;
        let decoded = ctx.invoke(
            ops::VAE_DECODE,
            NodeInputs::new()
                .with("samples", value_at(&sampled, 0)?)
                .with("vae", &cfg.vae),
        )?;

        let frame = ops::load_image(ctx, ops::WATERMARK_FRAME)?;
        let framed = ops::watermark_composite(ctx, &frame, value_at(&decoded, 0)?, true)?;
        let captioned = ops::caption_image(ctx, value_at(&framed, 0)?, request.patient)?;

        ops::finish_png(ctx, &captioned)
    }
}
