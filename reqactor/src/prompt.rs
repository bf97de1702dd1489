//! Prompt assembly for the model call (§4.H step 3): the user's prompt plus,
//! for reference-bearing operations, a short instruction clause telling the
//! model which part of the reference image to honor.

use imagegen_core::ReferenceKind;

pub fn build_prompt(base: &str, reference_kind: Option<ReferenceKind>) -> String {
    match reference_kind {
        None => base.to_string(),
        Some(kind) => format!("{base}\n\n{}", instruction_for(kind)),
    }
}

fn instruction_for(kind: ReferenceKind) -> &'static str {
    match kind {
        ReferenceKind::Subject => {
            "Preserve the main subject of the reference image; adapt everything else to the prompt."
        }
        ReferenceKind::Face => {
            "Preserve the face and identity shown in the reference image exactly; adapt pose, outfit and setting to the prompt."
        }
        ReferenceKind::FullImage => {
            "Use the reference image as the starting composition and apply the prompt's requested changes to it."
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_reference_kind_leaves_the_prompt_untouched() {
        assert_eq!(build_prompt("a cat", None), "a cat");
    }

    #[test]
    fn reference_kind_appends_an_instruction() {
        let prompt = build_prompt("a cat", Some(ReferenceKind::Face));
        assert!(prompt.starts_with("a cat"));
        assert!(prompt.contains("identity"));
    }
}
