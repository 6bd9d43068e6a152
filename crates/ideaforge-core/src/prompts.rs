//! Text prompts sent to the image and video models.
//!
//! Only industry and audience reach the prompts; the other form fields are
//! carried along for display.

use crate::form::IdeaFormData;

/// Hero-section image prompt. `count` is the number of variants asked for.
pub fn image_prompt(form: &IdeaFormData, count: u32) -> String {
    format!(
        "Generate {count} distinct, visually appealing images for a website hero section. \
The website is for a SaaS startup in the '{industry}' industry, targeting '{audience}'. \
The images should evoke themes of innovation, technology, and success. \
The style should be modern, professional, and abstract. Do not include any text in the images.",
        count = count,
        industry = form.industry,
        audience = form.audience,
    )
}

/// Short promotional video prompt.
pub fn video_prompt(form: &IdeaFormData) -> String {
    format!(
        "A short, 3-5 second dynamic promotional video for a new SaaS product in the '{industry}' space, \
targeting '{audience}'. Show abstract scenes of collaboration, data visualization, and user success. \
The style should be cinematic, tech-oriented, and optimistic.",
        industry = form.industry,
        audience = form.audience,
    )
}
