//! Prompt templates for image and scene requests.
//!
//! The session layer hands over an already composed prompt; these templates
//! only wrap it in task instructions for the model.

use minijinja::{Environment, context};

use muse_core::backend::{ImageRequest, SceneRequest};
use muse_core::{MuseError, Result};

const IMAGE_GENERATE: &str = "\
Generate a high-quality image based on this description: {{ prompt }}

Please create a detailed, visually appealing image that accurately represents the described scene, object, or concept. Focus on:
- High visual quality and detail
- Proper composition and lighting
- Realistic or appropriate artistic style
- Clear representation of the described elements";

const IMAGE_EDIT: &str = "\
Please analyze this image and generate a new image with the following modifications: {{ prompt }}

Instructions:
- Carefully examine the provided image
- Apply the requested modifications while maintaining the overall quality and style
- Keep the composition coherent and visually appealing
- Make the changes as natural and realistic as possible

Generate a new image that incorporates these changes.";

const SCENE_SYSTEM: &str = "\
You write JavaScript for a sandboxed Three.js viewer.
The runtime calls `export default function renderScene({ THREE, scene, camera, renderer, controls, OrbitControls })`.
Only those parameters are available: no imports, no network, no DOM access.
Answer with the code only.";

const SCENE_CREATE: &str = "\
Task: Create a 3D scene per: \"{{ prompt }}\"
Constraints:
- No imports; the runtime provides THREE, OrbitControls as parameters.
- Add reasonable lights and camera framing of subject.
- Use new OrbitControls(camera, renderer.domElement) if needed.
- Return ONLY code for export default function renderScene({ THREE, scene, camera, renderer, controls, OrbitControls }) { ... }.
- CRITICAL: Do NOT create any ground plane, base, floor, or platform. Create ONLY the requested 3D object floating in space.
- Scale the object to match the target dimensions: {{ x }} x {{ y }} x {{ z }} (width x height x depth).
- The scene already has a grid for reference - do not add PlaneGeometry or ground meshes.";

const SCENE_MODIFY: &str = "\
Task: Modify the existing Three.js scene per: \"{{ prompt }}\"

Current code:
{{ prior_source }}

A screenshot of the current render is attached. Please update the code so that the 3D object matches the requested modifications and target dimensions ({{ x }} x {{ y }} x {{ z }}).";

const REFERENCE_NOTE: &str = "\
Additionally, a reference image is provided to guide the modifications. Focus only on the main object, not any ground or base elements.";

/// Rendered templates keyed by purpose.
pub struct PromptTemplates {
    env: Environment<'static>,
}

impl PromptTemplates {
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        for (name, source) in [
            ("image_generate", IMAGE_GENERATE),
            ("image_edit", IMAGE_EDIT),
            ("scene_create", SCENE_CREATE),
            ("scene_modify", SCENE_MODIFY),
        ] {
            env.add_template(name, source).map_err(template_error)?;
        }
        Ok(Self { env })
    }

    /// User text for an image request: edit when a reference is attached.
    pub fn image_text(&self, request: &ImageRequest) -> Result<String> {
        let name = if request.is_edit() {
            "image_edit"
        } else {
            "image_generate"
        };
        self.render(name, context! { prompt => request.prompt })
    }

    /// User text for a scene request: modify only when both the prior code
    /// and its screenshot are available.
    pub fn scene_text(&self, request: &SceneRequest) -> Result<String> {
        let dims = request.dimensions;
        if request.is_modification() {
            self.render(
                "scene_modify",
                context! {
                    prompt => request.prompt,
                    prior_source => request.prior_source,
                    x => format!("{:.1}", dims.x),
                    y => format!("{:.1}", dims.y),
                    z => format!("{:.1}", dims.z),
                },
            )
        } else {
            self.render(
                "scene_create",
                context! {
                    prompt => request.prompt,
                    x => format!("{:.1}", dims.x),
                    y => format!("{:.1}", dims.y),
                    z => format!("{:.1}", dims.z),
                },
            )
        }
    }

    pub fn scene_system(&self) -> &'static str {
        SCENE_SYSTEM
    }

    pub fn reference_note(&self) -> &'static str {
        REFERENCE_NOTE
    }

    fn render(&self, name: &str, ctx: minijinja::Value) -> Result<String> {
        self.env
            .get_template(name)
            .and_then(|template| template.render(ctx))
            .map_err(template_error)
    }
}

fn template_error(err: minijinja::Error) -> MuseError {
    MuseError::internal(format!("prompt template error: {err}"))
}
