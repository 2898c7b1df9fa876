//! Multi-round scenarios.
//!
//! Each workflow opens with the user's request and continues with fixed
//! follow-up prompts that steer the team through design, build and
//! integration.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Workflow {
    Create,
    AddPage,
    Improve,
    Images,
    Feature,
}

/// One round of a workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scenario {
    pub title: &'static str,
    pub prompt: String,
}

impl Workflow {
    pub fn title(self) -> &'static str {
        match self {
            Workflow::Create => "STARTING PROJECT",
            Workflow::AddPage => "ADDING NEW PAGE TO PROJECT",
            Workflow::Improve => "IMPROVING EXISTING PAGE IN PROJECT",
            Workflow::Images => "ADDING IMAGES TO PROJECT",
            Workflow::Feature => "ADDING CUSTOM FEATURE TO PROJECT",
        }
    }

    fn opening(self) -> &'static str {
        match self {
            Workflow::Create => "Client wants to discuss requirements",
            Workflow::AddPage => "Client specifies new page requirements",
            Workflow::Improve => "Client specifies page improvement requirements",
            Workflow::Images => "Client specifies image requirements",
            Workflow::Feature => "Client specifies custom feature requirements",
        }
    }

    fn follow_ups(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Workflow::Create => &[
                (
                    "Developer implements the basic structure",
                    "Let's start implementing the website. Create the basic HTML structure with a homepage. Include proper DOCTYPE, head section with meta tags, title, and body structure. Also create a CSS file for styling and link it to the HTML. Make sure to create a solid foundation for the website.",
                ),
                (
                    "Designer creates images and improves visuals",
                    "We need actual images for the website. Generate hero images and product photos that look professional.",
                ),
                (
                    "Developer implements the newly made images",
                    "IMPORTANT: Look at the images that have been generated and implement them into the existing HTML files. Review all HTML files in the project and update them to include the new images using proper <img> tags with relative paths (e.g., src='images/filename.png'). Update the CSS files to style the images appropriately and add any necessary JavaScript functionality. Make sure to modify the existing files to properly display and integrate the new images.",
                ),
            ],
            Workflow::AddPage => &[
                (
                    "Designer creates layout and visual design for new page",
                    "Design the layout and visual elements for this new page. Consider how it fits with the existing website design and create any necessary images or graphics.",
                ),
                (
                    "Developer creates the new page",
                    "Look at the existing project files and create the new page with proper HTML structure, CSS styling, and any necessary JavaScript functionality. Make sure it matches the existing website's design and structure. Review all existing HTML files to understand the current design patterns, CSS classes, and layout structure before creating the new page.",
                ),
                (
                    "Developer updates navigation and links",
                    "IMPORTANT: Review ALL existing HTML files in the project and update each one to include navigation links to the new page. Look at the current navigation structure in each HTML file, then add appropriate <a> tags and update navigation menus consistently across all pages. Ensure the new page is properly integrated into the website structure by modifying every HTML file that contains navigation.",
                ),
            ],
            Workflow::Improve => &[
                (
                    "Designer reviews and updates page design",
                    "Review the existing page and create an improved design. Update the visual elements, layout, and styling. Generate any new images or graphics if needed to enhance the page.",
                ),
                (
                    "Developer implements page improvements",
                    "IMPORTANT: Look at all existing project files to understand the current structure, then implement the page improvements. Identify which specific HTML file needs to be improved and modify that file with updated HTML structure, CSS styling, and JavaScript functionality as needed. Also update any related CSS files and ensure the improvements enhance user experience while maintaining consistency with the overall website design. Review the existing files first, then make the specific modifications.",
                ),
            ],
            Workflow::Images => &[
                (
                    "Designer creates and generates images",
                    "Create and generate the requested images for the website. Use the IMAGE_ACTION format to generate professional, high-quality images that match the website's theme and purpose. Consider different image types like hero images, banners, icons, product photos, or background images as needed.",
                ),
                (
                    "Developer implements images into website",
                    "IMPORTANT: Review all existing HTML files and implement the newly generated images into the appropriate pages. For each image generated, determine which HTML file(s) should display it, then update those files to include the images with proper <img> tags using relative paths (e.g., src='images/filename.png'), add appropriate alt text, and ensure responsive design. Update CSS files to style the images appropriately and ensure they integrate well with the existing layout. Modify every relevant HTML file to include the new images.",
                ),
                (
                    "Developer optimizes image integration",
                    "Optimize the image integration by adding proper styling, responsive design features, and any necessary JavaScript functionality. Ensure images load efficiently and enhance the overall user experience.",
                ),
            ],
            Workflow::Feature => &[
                (
                    "Designer creates UI/UX for the feature",
                    "Design the user interface and user experience for the custom feature. Create mockups, determine the visual design, layout, and any necessary graphics or icons. Ensure the feature integrates well with the existing website design.",
                ),
                (
                    "Developer implements the feature functionality",
                    "IMPORTANT: Review all existing project files to understand the current website structure, then implement the custom feature functionality. Determine which HTML file(s) should contain the feature and modify those files to add the necessary HTML structure. Update or create CSS files to style the feature, and add JavaScript code to make the feature work. Ensure the feature is responsive, accessible, and integrates properly with the existing website by examining and modifying the appropriate existing files.",
                ),
                (
                    "Developer adds feature integration",
                    "IMPORTANT: Review ALL existing HTML files and integrate the custom feature with the rest of the website. Update navigation menus in each HTML file if needed, add links to the feature from relevant pages, and ensure the feature can be easily accessed by users. Look at each existing HTML file and make any necessary modifications to properly link to and integrate with the new feature.",
                ),
            ],
        }
    }

    /// Rounds to run: the request first, then the follow-ups.
    pub fn scenarios(self, request: &str) -> Vec<Scenario> {
        let mut out = vec![Scenario {
            title: self.opening(),
            prompt: request.to_string(),
        }];
        out.extend(self.follow_ups().iter().map(|&(title, prompt)| Scenario {
            title,
            prompt: prompt.to_string(),
        }));
        out
    }
}
