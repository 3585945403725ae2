use std::time::Duration;

use crate::segmentation::LabelSet;

/// One line per class: index, name and hex color.
pub fn build_legend(labels: &LabelSet) -> String {
    let width = labels.iter().map(|l| l.name.len()).max().unwrap_or(0);
    labels
        .iter()
        .enumerate()
        .map(|(index, label)| {
            let [r, g, b] = label.color.0;
            format!("{index:>3} {:<width$} #{r:02x}{g:02x}{b:02x}", label.name)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Text block shown next to each overlay frame.
pub fn status_text(model_id: &str, inference: Duration, legend: &str) -> Vec<String> {
    vec![
        format!("Model: {model_id}"),
        format!("Inference time: {:1.3} s", inference.as_secs_f64()),
        "Legend:".to_string(),
        legend.to_string(),
    ]
}
