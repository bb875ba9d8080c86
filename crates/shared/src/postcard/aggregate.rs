use std::collections::HashMap;

use super::error::PipelineError;
use super::types::{DEFAULT_LOCATION_LABEL, PhotoAnalysis, TripSummary};

pub const MAX_PALETTE_COLORS: usize = 8;
pub const MAX_MOTIFS: usize = 10;

const THEME_MOTIFS: usize = 3;
const FALLBACK_MOTIF: &str = "travel memories";

/// Merges per-photo analyses into one trip summary. Every analysis contributes;
/// nothing here calls out to a model, so identical inputs give identical output.
pub fn aggregate(
    analyses: &[PhotoAnalysis],
    location_label: &str,
    user_description: Option<&str>,
) -> Result<TripSummary, PipelineError> {
    if analyses.is_empty() {
        return Err(PipelineError::InvalidInput(
            "at least one photo analysis is required".to_string(),
        ));
    }

    let location_label = match location_label.trim() {
        "" => DEFAULT_LOCATION_LABEL.to_string(),
        trimmed => trimmed.to_string(),
    };
    let user_description = user_description
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToString::to_string);

    let unified_palette = unify_palette(analyses);
    let dominant_mood = resolve_mood(analyses);
    let primary_scene =
        most_common(analyses.iter().filter_map(|a| a.scene_category.as_deref()));
    let lighting = most_common(analyses.iter().filter_map(|a| a.lighting.as_deref()));
    let time_of_day = most_common(analyses.iter().filter_map(|a| a.time_of_day.as_deref()));
    let key_motifs = collect_motifs(analyses);

    let overall_theme = match analyses {
        [single] => single_photo_theme(single),
        _ => trip_theme(primary_scene.as_deref(), &key_motifs),
    };

    Ok(TripSummary {
        overall_theme,
        unified_palette,
        dominant_mood,
        key_motifs,
        location_label,
        user_description,
        photo_count: analyses.len(),
        primary_scene,
        lighting,
        time_of_day,
    })
}

struct Tally {
    display: String,
    count: usize,
    best_rank: usize,
    first_seen: usize,
}

/// Counts each normalized value once per photo and orders by
/// (count desc, best in-photo rank asc, first seen asc).
fn tally<'a, I, F>(
    analyses: &'a [PhotoAnalysis],
    values: F,
    normalize: fn(&str) -> String,
) -> Vec<Tally>
where
    F: Fn(&'a PhotoAnalysis) -> I,
    I: Iterator<Item = &'a str>,
{
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut tallies: Vec<Tally> = Vec::new();

    for analysis in analyses {
        let mut seen_in_photo: Vec<usize> = Vec::new();
        for (rank, raw) in values(analysis).enumerate() {
            let key = normalize(raw);
            if key.is_empty() {
                continue;
            }
            let next = tallies.len();
            let slot = *index.entry(key.clone()).or_insert(next);
            if slot == next {
                tallies.push(Tally {
                    display: key,
                    count: 0,
                    best_rank: rank,
                    first_seen: next,
                });
            }
            if seen_in_photo.contains(&slot) {
                continue;
            }
            seen_in_photo.push(slot);

            let tally = &mut tallies[slot];
            tally.count += 1;
            tally.best_rank = tally.best_rank.min(rank);
        }
    }

    tallies.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then(a.best_rank.cmp(&b.best_rank))
            .then(a.first_seen.cmp(&b.first_seen))
    });
    tallies
}

fn unify_palette(analyses: &[PhotoAnalysis]) -> Vec<String> {
    tally(
        analyses,
        |a| a.colors.iter().map(String::as_str),
        normalize_color,
    )
    .into_iter()
    .take(MAX_PALETTE_COLORS)
    .map(|tally| tally.display)
    .collect()
}

fn resolve_mood(analyses: &[PhotoAnalysis]) -> String {
    let moods = tally(
        analyses,
        |a| std::iter::once(a.mood.as_str()),
        normalize_phrase,
    );

    match moods.as_slice() {
        [] => "varied".to_string(),
        [only] => only.display.clone(),
        [top, second, ..] if top.count > second.count => {
            let minor = moods[1..]
                .iter()
                .take(2)
                .map(|tally| tally.display.clone())
                .collect::<Vec<_>>();
            format!("mostly {}, with {} moments", top.display, join_with_and(&minor))
        }
        [_, _] => format!(
            "a mix of {} and {} moments",
            moods[0].display, moods[1].display
        ),
        _ => {
            let named = moods
                .iter()
                .take(3)
                .map(|tally| tally.display.clone())
                .collect::<Vec<_>>();
            format!("a blend of {} moments", join_with_and(&named))
        }
    }
}

/// Notable elements deduplicated case-insensitively, recurring ones first.
/// Falls back to scene categories so the result is never empty.
fn collect_motifs(analyses: &[PhotoAnalysis]) -> Vec<String> {
    let mut motifs = tally(
        analyses,
        |a| a.notable_elements.iter().map(String::as_str),
        normalize_phrase,
    );
    motifs.sort_by(|a, b| {
        let a_recurring = a.count >= 2;
        let b_recurring = b.count >= 2;
        b_recurring
            .cmp(&a_recurring)
            .then(a.first_seen.cmp(&b.first_seen))
    });

    let motifs = motifs
        .into_iter()
        .take(MAX_MOTIFS)
        .map(|tally| tally.display)
        .collect::<Vec<_>>();
    if !motifs.is_empty() {
        return motifs;
    }

    let scenes = tally(
        analyses,
        |a| a.scene_category.as_deref().into_iter(),
        normalize_phrase,
    )
    .into_iter()
    .map(|tally| tally.display)
    .collect::<Vec<_>>();
    if scenes.is_empty() {
        vec![FALLBACK_MOTIF.to_string()]
    } else {
        scenes
    }
}

fn most_common<'a>(values: impl Iterator<Item = &'a str>) -> Option<String> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for value in values {
        let key = normalize_phrase(value);
        if key.is_empty() {
            continue;
        }
        match counts.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, count)) => *count += 1,
            None => counts.push((key, 1)),
        }
    }

    // max_by_key keeps the last maximum, so walk in reverse to prefer first seen.
    counts
        .into_iter()
        .rev()
        .max_by_key(|(_, count)| *count)
        .map(|(value, _)| value)
}

/// The theme describes only what the photos show. Location and description are
/// added per run, so regenerate overrides never contradict a stored theme.
fn single_photo_theme(analysis: &PhotoAnalysis) -> String {
    let scene = analysis
        .scene_description
        .trim()
        .trim_end_matches(['.', '!', '?'])
        .to_string();
    format!(
        "A {} moment: {}",
        normalize_phrase(&analysis.mood),
        lowercase_first(&scene)
    )
}

fn trip_theme(primary_scene: Option<&str>, motifs: &[String]) -> String {
    let scene = match primary_scene {
        Some(scene) => format!("{scene} scenes"),
        None => "scenes".to_string(),
    };
    let highlights = motifs.iter().take(THEME_MOTIFS).cloned().collect::<Vec<_>>();
    format!(
        "A journey through {scene} featuring {}",
        join_with_and(&highlights)
    )
}

fn normalize_phrase(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn normalize_color(raw: &str) -> String {
    let color = normalize_phrase(raw);
    if let Some(hex) = color.strip_prefix('#')
        && hex.len() == 3
        && hex.chars().all(|c| c.is_ascii_hexdigit())
    {
        return hex.chars().fold(String::from("#"), |mut expanded, c| {
            expanded.push(c);
            expanded.push(c);
            expanded
        });
    }
    color.replace("grey", "gray")
}

fn lowercase_first(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub(crate) fn join_with_and(items: &[String]) -> String {
    match items {
        [] => String::new(),
        [only] => only.clone(),
        [init @ .., last] => format!("{} and {last}", init.join(", ")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analysis(colors: &[&str], mood: &str, elements: &[&str]) -> PhotoAnalysis {
        PhotoAnalysis {
            scene_description: "Sunlit piazza with a fountain.".to_string(),
            colors: colors.iter().map(ToString::to_string).collect(),
            mood: mood.to_string(),
            notable_elements: elements.iter().map(ToString::to_string).collect(),
            scene_category: None,
            lighting: None,
            time_of_day: None,
        }
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(matches!(
            aggregate(&[], "Rome", None),
            Err(PipelineError::InvalidInput(_))
        ));
    }

    #[test]
    fn palette_prefers_recurring_then_salient_colors() {
        let analyses = [
            analysis(&["Ochre", "sky blue", "terracotta"], "serene", &["fountain"]),
            analysis(&["terracotta", "olive", "#FA0"], "serene", &["vespa"]),
            analysis(&["#ffaa00", "Terracotta ", "olive"], "serene", &["gelato"]),
        ];

        let summary = aggregate(&analyses, "Rome", None).expect("aggregate");

        assert_eq!(
            summary.unified_palette,
            vec!["terracotta", "#ffaa00", "olive", "ochre", "sky blue"]
        );
        let input_len: usize = analyses.iter().map(|a| a.colors.len()).sum();
        assert!(summary.unified_palette.len() <= input_len);
    }

    #[test]
    fn palette_is_capped() {
        let colors = ["a", "b", "c", "d", "e", "f", "g", "h", "i", "j"];
        let summary = aggregate(&[analysis(&colors, "calm", &[])], "Lisbon", None)
            .expect("aggregate");
        assert_eq!(summary.unified_palette.len(), MAX_PALETTE_COLORS);
        assert_eq!(summary.unified_palette[0], "a");
    }

    #[test]
    fn disagreeing_moods_are_synthesized_not_voted() {
        let two = [
            analysis(&["red"], "Serene", &[]),
            analysis(&["red"], "lively", &[]),
        ];
        assert_eq!(
            aggregate(&two, "Rome", None).expect("aggregate").dominant_mood,
            "a mix of serene and lively moments"
        );

        let three = [
            analysis(&["red"], "serene", &[]),
            analysis(&["red"], "lively", &[]),
            analysis(&["red"], "nostalgic", &[]),
        ];
        assert_eq!(
            aggregate(&three, "Rome", None).expect("aggregate").dominant_mood,
            "a blend of serene, lively and nostalgic moments"
        );

        let majority = [
            analysis(&["red"], "lively", &[]),
            analysis(&["red"], "serene", &[]),
            analysis(&["red"], "Lively", &[]),
        ];
        assert_eq!(
            aggregate(&majority, "Rome", None).expect("aggregate").dominant_mood,
            "mostly lively, with serene moments"
        );
    }

    #[test]
    fn motifs_put_recurring_elements_first_and_are_never_empty() {
        let analyses = [
            analysis(&["red"], "calm", &["Colosseum", "pasta"]),
            analysis(&["red"], "calm", &["scooters", "colosseum"]),
        ];
        let summary = aggregate(&analyses, "Rome", None).expect("aggregate");
        assert_eq!(summary.key_motifs, vec!["colosseum", "pasta", "scooters"]);

        let bare = [analysis(&["red"], "calm", &[])];
        let summary = aggregate(&bare, "Rome", None).expect("aggregate");
        assert_eq!(summary.key_motifs, vec![FALLBACK_MOTIF]);

        let mut with_scene = analysis(&["red"], "calm", &[]);
        with_scene.scene_category = Some("Beach".to_string());
        let summary = aggregate(&[with_scene], "Rome", None).expect("aggregate");
        assert_eq!(summary.key_motifs, vec!["beach"]);
    }

    #[test]
    fn single_photo_is_promoted_with_an_adapted_theme() {
        let photo = analysis(&["gold", "blue"], "Nostalgic", &["fountain"]);
        let summary = aggregate(std::slice::from_ref(&photo), "  ", Some("first trip abroad"))
            .expect("aggregate");

        assert_eq!(summary.location_label, DEFAULT_LOCATION_LABEL);
        assert_eq!(summary.dominant_mood, "nostalgic");
        assert_eq!(summary.unified_palette, vec!["gold", "blue"]);
        assert_eq!(summary.photo_count, 1);
        assert_ne!(summary.overall_theme, photo.scene_description);
        assert_eq!(
            summary.overall_theme,
            "A nostalgic moment: sunlit piazza with a fountain"
        );
        assert_eq!(summary.user_description.as_deref(), Some("first trip abroad"));
    }

    #[test]
    fn multi_photo_theme_names_scene_and_motifs_only() {
        let mut first = analysis(&["red"], "calm", &["ruins", "espresso"]);
        first.scene_category = Some("urban".to_string());
        first.lighting = Some("golden hour".to_string());
        first.time_of_day = Some("Dusk".to_string());
        let mut second = analysis(&["red"], "calm", &["ruins"]);
        second.scene_category = Some("Urban".to_string());

        let summary = aggregate(&[first, second], "Rome, Fall 2024", None).expect("aggregate");

        assert_eq!(summary.primary_scene.as_deref(), Some("urban"));
        assert_eq!(summary.lighting.as_deref(), Some("golden hour"));
        assert_eq!(summary.time_of_day.as_deref(), Some("dusk"));
        assert_eq!(
            summary.overall_theme,
            "A journey through urban scenes featuring ruins and espresso"
        );
        assert!(!summary.overall_theme.contains("Rome"));
    }

    #[test]
    fn aggregation_is_deterministic() {
        let analyses = [
            analysis(&["red", "blue"], "calm", &["boats"]),
            analysis(&["blue", "green"], "busy", &["market"]),
        ];
        assert_eq!(
            aggregate(&analyses, "Porto", None).expect("aggregate"),
            aggregate(&analyses, "Porto", None).expect("aggregate")
        );
    }
}
