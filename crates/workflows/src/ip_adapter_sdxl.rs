//! SDXL base+refiner pipeline driven by multi-view style-adapter
//! embeddings.
//!
//! Four pre-shot reference views of the plush species are encoded and
//! concatenated into adapter embeddings that steer the base model. The
//! base sampler runs the first 35 of 40 steps with leftover noise; the
//! refiner checkpoint finishes the pass. Depth of the background-
//! removed input conditions both via a control-net.

use txr_engine::{value_at, Device, EngineValue, NodeInputs, NodeOutput};

use crate::error::WorkflowError;
use crate::ops::{self, noise_seed};
use crate::prompts;
use crate::workflow::{GenerateRequest, Workflow, WorkflowContext};

const BASE_CHECKPOINT: &str = "sd_xl_base_1.0.safetensors";
const REFINER_CHECKPOINT: &str = "SDXL/sd_xl_refiner_1.0.safetensors";
const XRAY_LORA: &str = "xraylorasdxl.safetensors";
const CONTROL_NET_FILE: &str =
    "SDXL/controlnet-union-sdxl-1.0/diffusion_pytorch_model_promax.safetensors";
const VLM_MODEL: &str = "deepseek-ai/Janus-Pro-1B";
const DEPTH_CHECKPOINT: &str = "depth_anything_vitb14.pth";
const ADAPTER_PRESET: &str = "PLUS (high strength)";

/// Reference views encoded into the adapter embedding, in batch order.
const REFERENCE_VIEWS: [&str; 4] = ["back", "front", "side", "front2"];

const TOTAL_STEPS: u32 = 40;
const BASE_END_STEP: u32 = 35;
/// Past any real step count: the refiner runs to the schedule's end.
const REFINER_END_STEP: u32 = 908;

/// Job-independent handles produced by `load_once`.
#[derive(Debug, Clone)]
struct IpAdapterSdxlConfig {
    latent: EngineValue,
    vlm_model: EngineValue,
    vlm_processor: EngineValue,
    base_model: EngineValue,
    base_clip: EngineValue,
    negative_base: EngineValue,
    refiner_model: EngineValue,
    refiner_clip: EngineValue,
    refiner_vae: EngineValue,
    negative_refiner: EngineValue,
    control_net: EngineValue,
    adapter_model: EngineValue,
    adapter: EngineValue,
}

pub struct IpAdapterSdxl {
    ctx: WorkflowContext,
    config: Option<IpAdapterSdxlConfig>,
}

impl IpAdapterSdxl {
    pub const NAME: &'static str = "IP_Adapter_SDXL";

    pub fn new(ctx: WorkflowContext) -> Self {
        Self { ctx, config: None }
    }

    /// Encode one reference view into adapter embeddings.
    fn encode_reference(
        &self,
        cfg: &IpAdapterSdxlConfig,
        animal: &str,
        view: &str,
    ) -> Result<NodeOutput, WorkflowError> {
        let path = self.ctx.assets.reference_image(animal, view)?;
        let loaded = ops::load_image(&self.ctx, &path.to_string_lossy())?;
        self.ctx.invoke(
            ops::IPADAPTER_ENCODER,
            NodeInputs::new()
                .with("weight", 1)
                .with("ipadapter", &cfg.adapter)
                .with("image", value_at(&loaded, 0)?),
        )
    }

    /// Concatenate the four per-view embeddings (index 0 = positive,
    /// index 1 = negative).
    fn combine_embeddings(
        &self,
        views: &[NodeOutput],
        index: usize,
    ) -> Result<NodeOutput, WorkflowError> {
        let mut inputs = NodeInputs::new().with("method", "concat");
        for (i, view) in views.iter().enumerate() {
            inputs = inputs.with(&format!("embed{}", i + 1), value_at(view, index)?);
        }
        self.ctx.invoke(ops::IPADAPTER_COMBINE_EMBEDS, inputs)
    }
}

impl Workflow for IpAdapterSdxl {
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

        let base = ctx.invoke(
            ops::CHECKPOINT_LOADER,
            NodeInputs::new().with("ckpt_name", BASE_CHECKPOINT),
        )?;
        let latent = ctx.invoke(
            ops::EMPTY_LATENT,
            NodeInputs::new()
                .with("width", 1024)
                .with("height", 1024)
                .with("batch_size", 1),
        )?;
        let vlm = ctx.invoke(
            ops::VLM_LOADER,
            NodeInputs::new().with("model_name", VLM_MODEL),
        )?;
        let lora = ctx.invoke(
            ops::LORA_LOADER,
            NodeInputs::new()
                .with("lora_name", XRAY_LORA)
                .with("strength_model", 1)
                .with("strength_clip", 1)
                .with("model", value_at(&base, 0)?)
                .with("clip", value_at(&base, 1)?),
        )?;
        let negative_base = ops::encode_text(ctx, prompts::SDXL_NEGATIVE, value_at(&lora, 1)?)?;

        let refiner = ctx.invoke(
            ops::CHECKPOINT_LOADER,
            NodeInputs::new().with("ckpt_name", REFINER_CHECKPOINT),
        )?;
        let negative_refiner =
            ops::encode_text(ctx, prompts::SDXL_NEGATIVE, value_at(&refiner, 1)?)?;

        let control_net = ctx.invoke(
            ops::CONTROL_NET_LOADER,
            NodeInputs::new().with("control_net_name", CONTROL_NET_FILE),
        )?;
        let adapter = ctx.invoke(
            ops::IPADAPTER_UNIFIED_LOADER,
            NodeInputs::new()
                .with("preset", ADAPTER_PRESET)
                .with("model", value_at(&lora, 0)?),
        )?;

        self.config = Some(IpAdapterSdxlConfig {
            latent: value_at(&latent, 0)?.clone(),
            vlm_model: value_at(&vlm, 0)?.clone(),
            vlm_processor: value_at(&vlm, 1)?.clone(),
            base_model: value_at(&lora, 0)?.clone(),
            base_clip: value_at(&lora, 1)?.clone(),
            negative_base: value_at(&negative_base, 0)?.clone(),
            refiner_model: value_at(&refiner, 0)?.clone(),
            refiner_clip: value_at(&refiner, 1)?.clone(),
            refiner_vae: value_at(&refiner, 2)?.clone(),
            negative_refiner: value_at(&negative_refiner, 0)?.clone(),
            control_net: value_at(&control_net, 0)?.clone(),
            adapter_model: value_at(&adapter, 0)?.clone(),
            adapter: value_at(&adapter, 1)?.clone(),
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

        // The VLM writes the skeleton prompt from the input photo.
        let prompt = ctx.invoke(
            ops::VLM_UNDERSTAND,
            NodeInputs::new()
                .with("question", prompts::VLM_PROMPT_QUESTION)
                .with("seed", noise_seed())
                .with("temperature", 0.7)
                .with("top_p", 0.9)
                .with("max_new_tokens", 2048)
                .with("model", &cfg.vlm_model)
                .with("processor", &cfg.vlm_processor)
                .with("image", value_at(&input, 0)?),
        )?;
        let positive_base = ops::encode_text(ctx, value_at(&prompt, 0)?, &cfg.base_clip)?;
        let positive_refiner = ops::encode_text(ctx, value_at(&prompt, 0)?, &cfg.refiner_clip)?;

        // Adapter embeddings from the four reference views of this
        // species.
        let species = request.patient.species();
        let views = REFERENCE_VIEWS
            .iter()
            .map(|view| self.encode_reference(cfg, species, view))
            .collect::<Result<Vec<_>, _>>()?;
        let positive_embeds = self.combine_embeddings(&views, 0)?;
        let negative_embeds = self.combine_embeddings(&views, 1)?;
        let adapted = ctx.invoke(
            ops::IPADAPTER_EMBEDS,
            NodeInputs::new()
                .with("weight", 1)
                .with("weight_type", "linear")
                .with("start_at", 0)
                .with("end_at", 1)
                .with("embeds_scaling", "V only")
                .with("model", &cfg.adapter_model)
                .with("ipadapter", &cfg.adapter)
                .with("pos_embed", value_at(&positive_embeds, 0)?)
                .with("neg_embed", value_at(&negative_embeds, 0)?),
        )?;

        // Depth conditioning: white-matte cutout, depth, black matte.
        let resized = ops::resize(ctx, value_at(&input, 0)?, 1024, 1152)?;
        let cutout =
            ops::remove_background(ctx, value_at(&resized, 0)?, "u2netp", "white", false, true)?;
        let depth = ops::depth_map(ctx, value_at(&cutout, 0)?, DEPTH_CHECKPOINT)?;
        let matte =
            ops::remove_background(ctx, value_at(&depth, 0)?, "u2net", "black", false, true)?;

        let conditioned = ctx.invoke(
            ops::CONTROL_NET_APPLY,
            NodeInputs::new()
                .with("strength", 1)
                .with("start_percent", 0)
                .with("end_percent", 1)
                .with("positive", value_at(&positive_base, 0)?)
                .with("negative", &cfg.negative_base)
                .with("control_net", &cfg.control_net)
                .with("image", value_at(&matte, 0)?),
        )?;

        // Two-stage sampling: base with leftover noise, then refiner.
        let base_pass = ctx.invoke(
            ops::KSAMPLER_ADVANCED,
            NodeInputs::new()
                .with("add_noise", "enable")
                .with("noise_seed", noise_seed())
                .with("steps", TOTAL_STEPS)
                .with("cfg", 15.5)
                .with("sampler_name", "euler")
                .with("scheduler", "sgm_uniform")
                .with("start_at_step", 0)
                .with("end_at_step", BASE_END_STEP)
                .with("return_with_leftover_noise", "enable")
                .with("model", value_at(&adapted, 0)?)
                .with("positive", value_at(&conditioned, 0)?)
                .with("negative", value_at(&conditioned, 1)?)
                .with("latent_image", &cfg.latent),
        )?;
        let refined = ctx.invoke(
            ops::KSAMPLER_ADVANCED,
            NodeInputs::new()
                .with("add_noise", "disable")
                .with("noise_seed", noise_seed())
                .with("steps", TOTAL_STEPS)
                .with("cfg", 14)
                .with("sampler_name", "euler")
                .with("scheduler", "sgm_uniform")
                .with("start_at_step", BASE_END_STEP)
                .with("end_at_step", REFINER_END_STEP)
                .with("return_with_leftover_noise", "disable")
                .with("model", &cfg.refiner_model)
                .with("positive", value_at(&positive_refiner, 0)?)
                .with("negative", &cfg.negative_refiner)
                .with("latent_image", value_at(&base_pass, 0)?),
        )?;
        let decoded = ctx.invoke(
            ops::VAE_DECODE,
            NodeInputs::new()
                .with("samples", value_at(&refined, 0)?)
                .with("vae", &cfg.refiner_vae),
        )?;

        let frame = ops::load_image(ctx, ops::WATERMARK_FRAME)?;
        let framed = ops::watermark_composite(ctx, &frame, value_at(&decoded, 0)?, true)?;
        let captioned = ops::caption_image(ctx, value_at(&framed, 0)?, request.patient)?;

        ops::finish_png(ctx, &captioned)
    }
}
