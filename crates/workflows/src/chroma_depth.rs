//! Chroma pipeline: text-and-depth-conditioned single sampling pass.
//!
//! The depth map of the plush is masked to its silhouette and blended
//! with a static backdrop before VAE encoding, so the sampler denoises
//! inside the subject only. Prompt text comes from a local LLM shown
//! the silhouette cutout.

use txr_engine::{value_at, Device, EngineValue, NodeInputs};

use crate::error::WorkflowError;
use crate::ops::{self, noise_seed};
use crate::prompts;
use crate::workflow::{GenerateRequest, Workflow, WorkflowContext};

const T5_FILE: &str = "t5/t5xxl_fp16.safetensors";
const UNET_FILE: &str = "chroma-unlocked-v44-detail-calibrated.safetensors";
const VAE_FILE: &str = "diffusion_pytorch_model.safetensors";
const TURBO_LORA: &str = "Hyper-Chroma-Turbo-Alpha-16steps-lora.safetensors";
const DEPTH_CHECKPOINT: &str = "depth_anything_vitl14.pth";
/// Static backdrop blended outside the subject silhouette.
const BACKDROP_IMAGE: &str = "pasted/image (1).png";
/// Watermark frame for this pipeline's output size.
const WATERMARK_IMAGE: &str = "Watermark1.png";

const LLM_URL: &str = "http://127.0.0.1:11435";
const LLM_MODEL: &str = "mistral-small3.1:24b";

/// Job-independent handles produced by `load_once`.
#[derive(Debug, Clone)]
struct ChromaDepthConfig {
    latent: EngineValue,
    clip: EngineValue,
    negative: EngineValue,
    model: EngineValue,
    vae: EngineValue,
}

pub struct ChromaDepth {
    ctx: WorkflowContext,
    config: Option<ChromaDepthConfig>,
}

impl ChromaDepth {
    pub const NAME: &'static str = "ChromaV44";

    pub fn new(ctx: WorkflowContext) -> Self {
        Self { ctx, config: None }
    }
}

impl Workflow for ChromaDepth {
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

        let latent = ctx.invoke(
            ops::EMPTY_SD3_LATENT,
            NodeInputs::new()
                .with("width", 1024)
                .with("height", 1024)
                .with("batch_size", 1),
        )?;
        let clip = ctx.invoke(
            ops::CLIP_LOADER,
            NodeInputs::new()
                .with("clip_name", T5_FILE)
                .with("type", "chroma")
                .with("device", "default"),
        )?;
        // Tokenizer padding options wrap the clip handle.
        let clip = ctx.invoke(
            ops::T5_TOKENIZER_OPTIONS,
            NodeInputs::new()
                .with("min_padding", 1)
                .with("min_length", 0)
                .with("clip", value_at(&clip, 0)?),
        )?;
        let negative = ops::encode_text(ctx, prompts::CHROMA_NEGATIVE, value_at(&clip, 0)?)?;

        let unet = ctx.invoke(
            ops::UNET_LOADER,
            NodeInputs::new()
                .with("unet_name", UNET_FILE)
                .with("weight_dtype", "default"),
        )?;
        let vae = ctx.invoke(ops::VAE_LOADER, NodeInputs::new().with("vae_name", VAE_FILE))?;
        let model = ctx.invoke(
            ops::LORA_LOADER_MODEL_ONLY,
            NodeInputs::new()
                .with("lora_name", TURBO_LORA)
                .with("strength_model", 0.49)
                .with("model", value_at(&unet, 0)?),
        )?;

        self.config = Some(ChromaDepthConfig {
            latent: value_at(&latent, 0)?.clone(),
            clip: value_at(&clip, 0)?.clone(),
            negative: value_at(&negative, 0)?.clone(),
            model: value_at(&model, 0)?.clone(),
            vae: value_at(&vae, 0)?.clone(),
        });
        Ok(())
    }

    fn generate(&self, request: &GenerateRequest<'_>) -> Result<Vec<u8>, WorkflowError> {
        let cfg = self
            .config
            .as_ref()
            .ok_or(WorkflowError::NotLoaded(Self::NAME))?;
        let ctx = &self.ctx;

        let (_staged, input) = ops::load_input_image(ctx, request.image)?;
        let resized = ops::resize(ctx, value_at(&input, 0)?, 1024, 1024)?;

        // Silhouette on black, then depth of it.
        let silhouette =
            ops::remove_background(ctx, value_at(&resized, 0)?, "u2net", "black", false, true)?;
        let depth = ops::depth_map(ctx, value_at(&silhouette, 0)?, DEPTH_CHECKPOINT)?;

        // Subject mask from a transparent cutout.
        let cutout = ops::remove_background(
            ctx,
            value_at(&silhouette, 0)?,
            "isnet-general-use",
            "none",
            true,
            false,
        )?;
        let mask = ctx.invoke(
            ops::ALPHA_CHANNEL_AS_MASK,
            NodeInputs::new()
                .with("method", "invert")
                .with("images", value_at(&cutout, 0)?),
        )?;
        let mask_image = ctx.invoke(
            ops::MASK_TO_IMAGE,
            NodeInputs::new().with("mask", value_at(&mask, 0)?),
        )?;

        // Depth inside the mask, backdrop outside, summed.
        let masked_depth = ctx.invoke(
            ops::MULTIPLY,
            NodeInputs::new()
                .with("input1", value_at(&depth, 0)?)
                .with("input2", value_at(&mask_image, 0)?),
        )?;
        let backdrop = ops::load_image(ctx, BACKDROP_IMAGE)?;
        let backdrop = ops::resize(ctx, value_at(&backdrop, 0)?, 1024, 1024)?;
        let inverted_mask = ctx.invoke(
            ops::INVERT_IMAGE,
            NodeInputs::new().with("image", value_at(&mask_image, 0)?),
        )?;
        let masked_backdrop = ctx.invoke(
            ops::MULTIPLY,
            NodeInputs::new()
                .with("input1", value_at(&backdrop, 0)?)
                .with("input2", value_at(&inverted_mask, 0)?),
        )?;
        let composed = ctx.invoke(
            ops::ADD,
            NodeInputs::new()
                .with("input1", value_at(&masked_depth, 0)?)
                .with("input2", value_at(&masked_backdrop, 0)?),
        )?;
        let latent_in = ctx.invoke(
            ops::VAE_ENCODE,
            NodeInputs::new()
                .with("pixels", value_at(&composed, 0)?)
                .with("vae", &cfg.vae),
        )?;

        // Prompt from the local LLM shown the silhouette.
        let llm = ctx.invoke(
            ops::OLLAMA_CONNECTIVITY,
            NodeInputs::new()
                .with("url", LLM_URL)
                .with("model", LLM_MODEL)
                .with("keep_alive", 5)
                .with("keep_alive_unit", "minutes"),
        )?;
        let written = ctx.invoke(
            ops::OLLAMA_GENERATE,
            NodeInputs::new()
                .with("system", "")
                .with("prompt", prompts::CHROMA_LLM_INSTRUCTIONS)
                .with("filter_thinking", true)
                .with("keep_context", false)
                .with("format", "text")
                .with("connectivity", value_at(&llm, 0)?)
                .with("images", value_at(&silhouette, 0)?),
        )?;
        let positive = ops::encode_text(ctx, value_at(&written, 0)?, &cfg.clip)?;

        let sampled = ctx.invoke(
            ops::KSAMPLER,
            NodeInputs::new()
                .with("seed", noise_seed())
                .with("steps", 15)
                .with("cfg", 4)
                .with("sampler_name", "euler")
                .with("scheduler", "beta")
                .with("denoise", 0.8)
                .with("model", &cfg.model)
                .with("positive", value_at(&positive, 0)?)
                .with("negative", &cfg.negative)
                .with("latent_image", value_at(&latent_in, 0)?),
        )?;
        let decoded = ctx.invoke(
            ops::VAE_DECODE,
            NodeInputs::new()
                .with("samples", value_at(&sampled, 0)?)
                .with("vae", &cfg.vae),
        )?;

        let frame = ops::load_image(ctx, WATERMARK_IMAGE)?;
        let framed = ops::watermark_composite(ctx, &frame, value_at(&decoded, 0)?, false)?;
        let captioned = ops::caption_image(ctx, value_at(&framed, 0)?, request.patient)?;

        ops::finish_png(ctx, &captioned)
    }
}
