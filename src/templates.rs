//! The tagging guide written into projects by `asktag init`.

use crate::category::Category;
use crate::dispatch::template_for;

/// Default file name for the guide.
pub const GUIDE_FILE_NAME: &str = "QUESTION_TAGS.md";

/// Opening of the guide.
pub const GUIDE_INTRO_MD: &str = r#"# Question Tags

Start a message with a tag to get a reply in a predictable shape.

| Tag | You get |
|-----|---------|
| `[Quick Question]` | A short direct answer. No files touched. |
| `[Learning Question]` | An explanation with an example and links for further reading. |
| `[Debug Question]` | The root cause and numbered steps to fix it. |
| `[Design Question]` | Options and a recommendation first. Diagram and code only after you confirm. |

Tags can be combined: `[Learning Question] + [Design Question] explain X and help me structure Y`.
Both templates apply, in the order above.

No tag? Just ask naturally. The reply adapts to the question.
"#;

/// Closing notes of the guide.
pub const GUIDE_OUTRO_MD: &str = r#"## Notes

- Tags are case sensitive and must come first in the message.
- A design reply always stops after **Validation**. Reply `yes` (or `go ahead`, `lgtm`, ...)
  to continue. Anything else is treated as feedback and the options are revised.
"#;

const QUICK_EXAMPLE_MD: &str = r#"> **You:** [Quick Question]: Is it better to use `Vec` or `VecDeque` for a FIFO queue?
>
> **Assistant:** `VecDeque`. Popping from the front of a `Vec` shifts every element;
> `VecDeque` does it in constant time.
"#;

const LEARNING_EXAMPLE_MD: &str = r#"> **You:** [Learning Question] What does `?` do in a function returning `Result`?
>
> **Assistant:** *Concept:* early return on error. *Explanation:* `?` unwraps `Ok`,
> or converts the error with `From` and returns it. *Example:* `let cfg = fs::read_to_string(p)?;`
> *Common pitfalls:* using it in `main` without a `Result` return type.
> *Resources:* the Rust book, chapter 9.2.
"#;

const DEBUG_EXAMPLE_MD: &str = r#"> **You:** [Debug Question] ModuleNotFoundError: No module named 'requests'
>
> **Assistant:** *Problem:* the import fails at startup. *Root cause:* the virtualenv is not
> active, so the system interpreter runs. *Solution steps:* 1. `source .venv/bin/activate`
> 2. `pip install -r requirements.txt`. *Verify:* `python -c "import requests"`.
> *Prevention:* run the project through its task runner, which activates the venv.
"#;

const DESIGN_EXAMPLE_MD: &str = r#"> **You:** [Design Question] How should I store user sessions?
>
> **Assistant:** *Options:* signed cookies, Redis, the main database.
> *Comparison matrix:* latency, revocation, operational cost. *Recommendation:* Redis.
> *Validation:* Does Redis fit your deployment? Reply `yes` to continue or tell me what to change.
>
> **You:** yes
>
> **Assistant:** *Diagram:* request → session middleware → Redis.
> *Implementation plan:* 1. session store 2. middleware 3. logout endpoint.
"#;

/// Example exchange for a category.
pub fn example_dialogue(category: Category) -> &'static str {
    match category {
        Category::QuickQuestion => QUICK_EXAMPLE_MD,
        Category::LearningQuestion => LEARNING_EXAMPLE_MD,
        Category::DebugQuestion => DEBUG_EXAMPLE_MD,
        Category::DesignQuestion => DESIGN_EXAMPLE_MD,
    }
}

/// Guide section for one category, built from its template.
pub fn category_guide(category: Category) -> String {
    let template = template_for(category);
    let mut out = format!("## {}\n\n`{}`: {}.\n\n", category.label(), category.tag(), template.summary);

    for (i, section) in template.sections.iter().enumerate() {
        out.push_str(&format!("{}. **{}**: {}\n", i + 1, section.name, section.guidance));
        if template.checkpoint == Some(i) {
            out.push_str("\n   *Stop here and wait for confirmation.*\n\n");
        }
    }
    if !template.writes_files {
        out.push_str("\nNo files are created or edited.\n");
    }

    out.push_str("\n### Example\n\n");
    out.push_str(example_dialogue(category));
    out
}

/// The complete guide, or one category's part of it.
pub fn render_guide(only: Option<Category>) -> String {
    match only {
        Some(category) => category_guide(category),
        None => {
            let mut out = String::from(GUIDE_INTRO_MD);
            for category in Category::ALL {
                out.push('\n');
                out.push_str(&category_guide(category));
            }
            out.push('\n');
            out.push_str(GUIDE_OUTRO_MD);
            out
        }
    }
}
