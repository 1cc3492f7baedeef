//! Prompt text for the generation pipelines.
//!
//! These are tuned strings, not code: edit them together with the
//! model checkpoints they were calibrated against.

/// Question posed to the vision-language model for a short factual
/// description of the plush (FLUX pipeline).
pub const VLM_DESCRIBE_QUESTION: &str = "Clearly identify the type of animal (e.g., plush bear, \
plush rabbit), and specify whether it is shown from the front, side, or back. Keep the \
description concise and factual.";

/// Style template appended to the VLM description (FLUX pipeline).
pub const XRAY_STYLE_TEMPLATE: &str = "\nGenerate the animal depicted in a clean, clinical X-ray \
scan style. The internal bone structure is detailed and anatomically plausible, resembling \
simplified mammalian bones, including a visible spine with vertebrae, ribcage, arms, legs, \
joints, pelvis, and digits, all proportioned to the animals plush body. The bones are \
semi-transparent and softly glowing in white and pale blue, rendered with subtle radiographic \
shadows. The background is dark and neutral to mimic a real X-ray scan. The style is medical, \
technical, and illustrative, with no horror elements, no visible skull, no face or eyes, no \
soft tissue, no fur, no fabric seams. The overall mood is scientific and clean, not emotional \
or creepy. High-resolution, radiographic rendering, suitable for veterinary illustration or \
educational imaging.";

/// Negative prompt for the FLUX sampler.
pub const FLUX_NEGATIVE: &str = "low quality, blurry, out of focus, noisy, distorted anatomy, \
deformed limbs, missing bones, broken joints, horror elements, scary, creepy, disturbing, \
grotesque, blood, gore, flesh, skin texture, visible eyes, open mouth, facial expression, \
exposed skull, colorful background, vivid colors, fantasy style, surreal, painterly, cartoon, \
anime, watercolor, oil painting, overexposed, underexposed, strong shadows, photo artifacts, \
grain, chromatic aberration, double exposure, body horror, glowing eyes, nightmare style, \
unsettling, low resolution, soft rendering, plastic texture, shiny surface, incorrect \
perspective, unrealistic proportions, extra limbs, anatomical errors, fantasy bones, melted \
shapes, glitch effects, artistic filter, cinematic lighting, emotional tone";

/// Prompt-engineering instructions for the vision-language model in
/// the SDXL pipeline: describe the skeleton below the neck only.
pub const VLM_PROMPT_QUESTION: &str = "Generate a descriptive text prompt intended for use in an \
image generation model (e.g., Stable Diffusion) to create an X-ray-style image of the given \
subject. This prompt should focus entirely on the skeletal structure, while intentionally \
avoiding any mention of the skull, face, or head to maintain a neutral and non-creepy \
aesthetic.\n\nStructure the prompt in the following way:\n\nSpecies and anatomical context: \
Begin by identifying the subject and state that it is being represented in X-ray form, focusing \
on internal bone structures.\n\nDetailed skeletal description (excluding head):\nDescribe key \
bone structures such as:\n\nSpine and vertebrae\n\nLimbs (e.g., elongated hind legs, \
forelimbs)\n\nDigits or toes\n\nPelvis, ribs (if applicable)\n\nJoints and connections between \
bones\nBe anatomically accurate and emphasize proportions and layout.\n\nVisual appearance and \
rendering style:\nDefine the visual style using phrases like:\n\nsemi-transparent bones glowing \
in white or blue\n\nclean medical X-ray look\n\nset against a dark or neutral background\n\nno \
visible soft tissue details unless subtle\n\nStylistic tone and exclusions:\nMake it clear that \
the output should:\n\nBe clinical, technical, or illustrative\n\nAvoid all horror, fantasy, or \
emotionally charged interpretations\n\nExplicitly exclude any depiction or focus on the head or \
skull\n\nOptional enhancement terms:\nEncourage inclusion of terms such as:\n\nhigh \
resolution\n\nmedical illustration\n\nradiographic scan\n\nscientific rendering\n\nThe result \
should be a clean, anatomical-style image prompt focused on skeletal anatomy below the neck, \
suitable for generating an X-ray-style output that is medically inspired and visually neutral.";

/// Negative prompt shared by the SDXL base and refiner stages.
pub const SDXL_NEGATIVE: &str = "worst quality, low quality, blurry, noisy, text, signature, \
watermark, UI, cartoon, drawing, illustration, sketch, painting, anime, 3D render, \
(photorealistic plush toy), (visible fabric texture), (visible stuffing), colorful, vibrant \
colors, toy bones, plastic bones, cartoon bones, unrealistic skeleton, bad anatomy, deformed \
skeleton, disfigured, mutated limbs, extra limbs, fused bones, skin, fur, organs, background \
clutter, multiple animals";

/// Instructions for the local LLM that writes the Chroma prompt from a
/// frontal photo of the plush.
pub const CHROMA_LLM_INSTRUCTIONS: &str = "You are a visual analysis and prompt-engineering \
specialist. You are shown a single, clear, frontal image of a plush toy animal. Your goal is \
to:\n\nAnalyze the image carefully and describe the plush animal's external anatomical features \
in exhaustive detail, including:\n\nThe type of animal it represents (e.g., monkey, bear, \
rabbit).\n\nThe posture and orientation (e.g., sitting, standing, crouching, head facing \
forward or tilted).\n\nProportions of the limbs (length of arms vs. legs, relative size of \
hands and feet).\n\nSize and positioning of ears, eyes, nose, mouth, and tail (if \
visible).\n\nAny notable stylized features (e.g., exaggerated hands, large eyes, round head, \
oversized feet). Do not mention colors of the original image.\n\nBased solely on this image \
description, construct a FLUX prompt for generating a realistic, medically plausible X-ray \
image of the plush animal as if it had a biological internal structure.\n\nThe FLUX prompt must \
meet the following criteria:\n\nAccurately reflect the external anatomy, proportions, and \
posture of the plush animal.\n\nDepict a detailed, friendly skeletal system corresponding to \
the animal's body shape and pose. The bones should appear realistic but adapted to the \
exaggerated or cartoonish proportions of the plush.\n\nLimbs, hands, feet, ears, and tail (if \
present) must have anatomically plausible bone structures, adjusted to match the stylized \
features seen in the image.\n\nInclude only bones and soft-tissue glow; no internal organs or \
disturbing anatomical details.\n\nSoft-tissue glow should create a gentle, non-creepy X-ray \
effect, emphasizing bone contrast while allowing for a subtle outline of the body and \
limbs.\n\nPresent the X-ray in a clean, clinical radiographic style with a neutral or black \
background, without any horror elements or unsettling features.\n\nYour output must be only the \
final FLUX prompt, written in natural language, descriptive, precise, and fully self-contained.";

/// Negative prompt for the Chroma sampler.
pub const CHROMA_NEGATIVE: &str = "illustration, anime, drawing, artwork, bad hands, blurry, \
low quality, out of focus, deformed, smudged, red";
