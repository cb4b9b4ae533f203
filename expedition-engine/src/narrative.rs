//! Narrative rendering for intro lines and outcome templates.
use rand::Rng;

use crate::config::{EncounterConfig, NarrativeDef, OutcomeDetail};
use crate::constants::{
    FRAGMENT_SEPARATOR, PRIMARY_FALLBACK_NAME, PRIMARY_PLACEHOLDER, SECONDARY_FALLBACK_NAME,
    SECONDARY_PLACEHOLDER,
};
use crate::party::PartyMemberState;

/// Values substituted for the placeholders of one template.
#[derive(Debug, Clone, PartialEq, Eq)]
struct NarrativeTokens<'a> {
    primary: &'a str,
    secondary: &'a str,
}

impl NarrativeTokens<'_> {
    fn apply(&self, fragment: &str) -> String {
        [
            (PRIMARY_PLACEHOLDER, self.primary),
            (SECONDARY_PLACEHOLDER, self.secondary),
        ]
        .into_iter()
        .fold(fragment.to_string(), |text, (token, value)| {
            text.replace(token, value)
        })
    }
}

/// Choose one configured intro line uniformly.
pub fn pick_intro<R: Rng + ?Sized>(config: &EncounterConfig, rng: &mut R) -> String {
    if config.intro_narratives.is_empty() {
        return String::new();
    }
    let idx = rng.gen_range(0..config.intro_narratives.len());
    config.intro_narratives[idx].clone()
}

/// Render one narrative variant of `detail` for the acting member.
///
/// `{{secondary}}` resolves to a uniformly drawn conscious member other than
/// the actor; the draw only happens when the chosen template uses it.
pub fn render_narrative<R: Rng + ?Sized>(
    detail: &OutcomeDetail,
    actor: Option<usize>,
    party: &[PartyMemberState],
    rng: &mut R,
) -> String {
    if detail.narratives.is_empty() {
        return String::new();
    }
    let template = &detail.narratives[rng.gen_range(0..detail.narratives.len())];

    let primary = actor
        .and_then(|idx| party.get(idx))
        .map_or(PRIMARY_FALLBACK_NAME, |member| member.username.as_str());
    let secondary = if uses_secondary(template) {
        pick_secondary(actor, party, rng)
    } else {
        SECONDARY_FALLBACK_NAME
    };

    render_template(template, &NarrativeTokens { primary, secondary })
}

fn uses_secondary(template: &NarrativeDef) -> bool {
    template
        .fragments()
        .iter()
        .any(|fragment| fragment.contains(SECONDARY_PLACEHOLDER))
}

fn pick_secondary<'a, R: Rng + ?Sized>(
    actor: Option<usize>,
    party: &'a [PartyMemberState],
    rng: &mut R,
) -> &'a str {
    let others: Vec<&PartyMemberState> = party
        .iter()
        .enumerate()
        .filter(|(idx, member)| member.conscious && Some(*idx) != actor)
        .map(|(_, member)| member)
        .collect();
    if others.is_empty() {
        return SECONDARY_FALLBACK_NAME;
    }
    others[rng.gen_range(0..others.len())].username.as_str()
}

fn render_template(template: &NarrativeDef, tokens: &NarrativeTokens<'_>) -> String {
    template
        .fragments()
        .iter()
        .map(|fragment| fragment.trim())
        .filter(|fragment| !fragment.is_empty())
        .map(|fragment| sentence(tokens.apply(fragment)))
        .collect::<Vec<_>>()
        .join(FRAGMENT_SEPARATOR)
}

/// Close a fragment with a period unless it already ends in terminal punctuation.
fn sentence(mut text: String) -> String {
    if !text.ends_with(['.', '!', '?', '\u{2026}']) {
        text.push('.');
    }
    text
}
