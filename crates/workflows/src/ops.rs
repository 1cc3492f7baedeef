//! Engine op names and the node invocations shared by every variant.
//!
//! Op name constants mirror the engine's registry keys verbatim,
//! including the one with spaces. The helpers wrap the node calls that
//! appear in every pipeline (image staging, resize, background
//! removal, depth preprocessing, watermarking, captioning) so the
//! variant files read as their distinctive node order only.

use rand::Rng;
use txr_core::job::Patient;
use txr_core::text::format_caption;
use txr_engine::stage::{stage_image_bytes, StagedImage};
use txr_engine::{pixels, value_at, EngineValue, NodeInputs, NodeOutput};

use crate::error::WorkflowError;
use crate::workflow::WorkflowContext;

// ---------------------------------------------------------------------------
// Op registry keys
// ---------------------------------------------------------------------------

pub const LOAD_IMAGE: &str = "LoadImage";
pub const IMAGE_RESIZE: &str = "ImageResizeKJ";
pub const REMOVE_BACKGROUND: &str = "Image Rembg (Remove Background)";
pub const DEPTH_PREPROCESSOR: &str = "DepthAnythingPreprocessor";
pub const CLIP_TEXT_ENCODE: &str = "CLIPTextEncode";
pub const CONTROL_NET_LOADER: &str = "ControlNetLoader";
pub const CONTROL_NET_APPLY: &str = "ControlNetApplyAdvanced";
pub const CHECKPOINT_LOADER: &str = "CheckpointLoaderSimple";
pub const VAE_LOADER: &str = "VAELoader";
pub const VAE_ENCODE: &str = "VAEEncode";
pub const VAE_DECODE: &str = "VAEDecode";
pub const UNET_LOADER: &str = "UNETLoader";
pub const CLIP_LOADER: &str = "CLIPLoader";
pub const DUAL_CLIP_LOADER: &str = "DualCLIPLoader";
pub const T5_TOKENIZER_OPTIONS: &str = "T5TokenizerOptions";
pub const LORA_LOADER: &str = "LoraLoader";
pub const LORA_LOADER_MODEL_ONLY: &str = "LoraLoaderModelOnly";
pub const EMPTY_LATENT: &str = "EmptyLatentImage";
pub const EMPTY_SD3_LATENT: &str = "EmptySD3LatentImage";
pub const KSAMPLER: &str = "KSampler";
pub const KSAMPLER_ADVANCED: &str = "KSamplerAdvanced";
pub const FLUX_GUIDANCE: &str = "FluxGuidance";
pub const VLM_LOADER: &str = "JanusModelLoader";
pub const VLM_UNDERSTAND: &str = "JanusImageUnderstanding";
pub const TEXT_MULTILINE: &str = "Text Multiline";
pub const STRING_CONCATENATE: &str = "StringConcatenate";
pub const IPADAPTER_UNIFIED_LOADER: &str = "IPAdapterUnifiedLoader";
pub const IPADAPTER_ENCODER: &str = "IPAdapterEncoder";
pub const IPADAPTER_COMBINE_EMBEDS: &str = "IPAdapterCombineEmbeds";
pub const IPADAPTER_EMBEDS: &str = "IPAdapterEmbeds";
pub const IMAGE_COMPOSITE_MASKED: &str = "ImageCompositeMasked";
pub const TEXT_ON_IMAGE: &str = "TextOnImage";
pub const ALPHA_CHANNEL_AS_MASK: &str = "AlphaChanelAsMask";
pub const MASK_TO_IMAGE: &str = "MaskToImage";
pub const MULTIPLY: &str = "MultiplyNode";
pub const INVERT_IMAGE: &str = "InvertImageNode";
pub const ADD: &str = "AddNode";
pub const OLLAMA_CONNECTIVITY: &str = "OllamaConnectivityV2";
pub const OLLAMA_GENERATE: &str = "OllamaGenerateV2";

// ---------------------------------------------------------------------------
// Shared assets
// ---------------------------------------------------------------------------

/// Watermark frame composited over SDXL/FLUX results (engine-relative
/// path).
pub const WATERMARK_FRAME: &str = "pasted/image.png";

/// Caption placement and styling on the frame.
const CAPTION_X: i64 = 853;
const CAPTION_Y: i64 = 898;
const CAPTION_FONT_SIZE: i64 = 16;
const CAPTION_COLOR: &str = "#d3c7b6";
const CAPTION_FONT: &str = "en-AllRoundItalic.ttf";

// ---------------------------------------------------------------------------
// Shared node invocations
// ---------------------------------------------------------------------------

/// Fresh noise seed for a sampler invocation.
pub fn noise_seed() -> u64 {
    rand::rng().random()
}

/// Stage input bytes to a temp file and run the image-load op on it.
///
/// The staged file must outlive every op that reads from the returned
/// handles, so it is handed back to the caller.
pub fn load_input_image(
    ctx: &WorkflowContext,
    image: &[u8],
) -> Result<(StagedImage, NodeOutput), WorkflowError> {
    let staged = stage_image_bytes(image)?;
    let loaded = ctx.invoke(LOAD_IMAGE, NodeInputs::new().with("image", staged.path_str()))?;
    Ok((staged, loaded))
}

/// Load an image by engine-relative or absolute path.
pub fn load_image(ctx: &WorkflowContext, path: &str) -> Result<NodeOutput, WorkflowError> {
    ctx.invoke(LOAD_IMAGE, NodeInputs::new().with("image", path))
}

/// Center-crop resize with the parameters every pipeline uses.
pub fn resize(
    ctx: &WorkflowContext,
    image: &EngineValue,
    width: u32,
    height: u32,
) -> Result<NodeOutput, WorkflowError> {
    ctx.invoke(
        IMAGE_RESIZE,
        NodeInputs::new()
            .with("width", width)
            .with("height", height)
            .with("upscale_method", "nearest-exact")
            .with("keep_proportion", false)
            .with("divisible_by", 2)
            .with("crop", "center")
            .with("image", image),
    )
}

/// Background removal with the standard alpha-matting thresholds.
pub fn remove_background(
    ctx: &WorkflowContext,
    image: &EngineValue,
    model: &str,
    background_color: &str,
    transparency: bool,
    alpha_matting: bool,
) -> Result<NodeOutput, WorkflowError> {
    ctx.invoke(
        REMOVE_BACKGROUND,
        NodeInputs::new()
            .with("transparency", transparency)
            .with("model", model)
            .with("post_processing", false)
            .with("only_mask", false)
            .with("alpha_matting", alpha_matting)
            .with("alpha_matting_foreground_threshold", 240)
            .with("alpha_matting_background_threshold", 10)
            .with("alpha_matting_erode_size", 10)
            .with("background_color", background_color)
            .with("images", image),
    )
}

/// Monocular depth estimation at the working resolution.
pub fn depth_map(
    ctx: &WorkflowContext,
    image: &EngineValue,
    checkpoint: &str,
) -> Result<NodeOutput, WorkflowError> {
    ctx.invoke(
        DEPTH_PREPROCESSOR,
        NodeInputs::new()
            .with("ckpt_name", checkpoint)
            .with("resolution", 1024)
            .with("image", image),
    )
}

/// Encode prompt text (literal or engine text handle) with a clip.
pub fn encode_text(
    ctx: &WorkflowContext,
    text: impl Into<txr_engine::ArgValue>,
    clip: &EngineValue,
) -> Result<NodeOutput, WorkflowError> {
    ctx.invoke(
        CLIP_TEXT_ENCODE,
        NodeInputs::new().with("text", text).with("clip", clip),
    )
}

/// Composite the generated image into a watermark frame.
///
/// The frame op output carries the destination image at index 0 and
/// its mask at index 1.
pub fn watermark_composite(
    ctx: &WorkflowContext,
    frame: &NodeOutput,
    source: &EngineValue,
    resize_source: bool,
) -> Result<NodeOutput, WorkflowError> {
    ctx.invoke(
        IMAGE_COMPOSITE_MASKED,
        NodeInputs::new()
            .with("x", 0)
            .with("y", 0)
            .with("resize_source", resize_source)
            .with("destination", value_at(frame, 0)?)
            .with("source", source)
            .with("mask", value_at(frame, 1)?),
    )
}

/// Render the patient caption onto the framed image.
pub fn caption_image(
    ctx: &WorkflowContext,
    image: &EngineValue,
    patient: &Patient,
) -> Result<NodeOutput, WorkflowError> {
    ctx.invoke(
        TEXT_ON_IMAGE,
        NodeInputs::new()
            .with("text", format_caption(&patient.caption()))
            .with("x", CAPTION_X)
            .with("y", CAPTION_Y)
            .with("font_size", CAPTION_FONT_SIZE)
            .with("text_color", CAPTION_COLOR)
            .with("text_opacity", 1)
            .with("use_gradient", false)
            .with("start_color", "#ff0000")
            .with("end_color", "#0000ff")
            .with("angle", 0)
            .with("stroke_width", 0)
            .with("stroke_color", "#000000")
            .with("stroke_opacity", 1)
            .with("shadow_x", 0)
            .with("shadow_y", 0)
            .with("shadow_color", "#000000")
            .with("shadow_opacity", 1)
            .with("font_file", CAPTION_FONT)
            .with("image", image),
    )
}

/// Read the final image handle back and encode it as PNG bytes.
pub fn finish_png(ctx: &WorkflowContext, output: &NodeOutput) -> Result<Vec<u8>, WorkflowError> {
    let handle = value_at(output, 0)?;
    let tensor = ctx.engine.read_image(handle)?;
    Ok(pixels::encode_png(&tensor)?)
}
