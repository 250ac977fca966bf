use std::{fs, path::Path};

use plotly::{common::Mode, layout::Axis, Bar, Layout, Plot, Scatter};

use super::fragments::{BarSeries, PresenceSeries};
use crate::error::Result;

fn bar_plot(series: &BarSeries, title: String, y_title: &str) -> Plot {
    let mut plot = Plot::new();
    plot.set_layout(
        Layout::new()
            .title(title)
            .x_axis(Axis::new().title("Route".to_string()))
            .y_axis(Axis::new().title(y_title.to_string())),
    );

    let trace = Bar::new(series.routes.clone(), series.values.clone()).name(y_title);
    plot.add_trace(trace);
    plot
}

/// `Plot::write_html` panics on I/O errors, so the page is written here.
fn write_plot(plot: &Plot, output: &Path) -> Result<()> {
    debug!("Plotting {}", output.display());
    fs::write(output, plot.to_html())?;
    Ok(())
}

/// Average occurrences of every route over all tests of a host.
pub fn render_occurrences(host: &str, series: &BarSeries, output: &Path) -> Result<()> {
    let plot = bar_plot(
        series,
        format!("<b>{}: average occurrences vs. route</b>", host),
        "Occurrences",
    );
    write_plot(&plot, output)
}

/// Raw route counts of the first round of a host.
pub fn render_first_round(host: &str, series: &BarSeries, output: &Path) -> Result<()> {
    let plot = bar_plot(
        series,
        format!("<b>{}: first round, occurrences vs. route</b>", host),
        "Occurrences",
    );
    write_plot(&plot, output)
}

/// When each route appeared during the first round.
pub fn render_presence(host: &str, series: &PresenceSeries, output: &Path) -> Result<()> {
    let mut plot = Plot::new();
    plot.set_layout(
        Layout::new()
            .title(format!("<b>{}: route presence over time</b>", host))
            .x_axis(Axis::new().title("Time (s)".to_string()))
            .y_axis(
                Axis::new()
                    .title("Appear or not".to_string())
                    .tick_values(vec![0.0, 1.0])
                    .tick_text(vec!["F".to_string(), "T".to_string()]),
            ),
    );

    for route in &series.routes {
        let trace = Scatter::new(series.time.clone(), route.present.clone())
            .mode(Mode::Lines)
            .name(&route.route);
        plot.add_trace(trace);
    }

    write_plot(&plot, output)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        error::Error,
        utils::{
            capture::CaptureRecord,
            fragments::{presence_series, route_counts},
            test_dir,
        },
    };

    fn rows() -> Vec<CaptureRecord> {
        [("1, 2", 0.0), ("1, 3, 2", 0.5), ("1, 2", 1.0)]
            .into_iter()
            .map(|(ids, time)| CaptureRecord {
                hop_count: ids.split(", ").count() as u16,
                path_ids: ids.to_owned(),
                time,
            })
            .collect()
    }

    #[test]
    fn renders_all_charts() {
        let dir = test_dir("charts-render");
        let rows = rows();
        let counts = route_counts(&rows);

        render_occurrences("h2", &counts, &dir.join("h2_occurrences.html")).unwrap();
        render_first_round("h2", &counts, &dir.join("h2_first_round.html")).unwrap();
        render_presence(
            "h2",
            &presence_series(&rows, 0.25).unwrap(),
            &dir.join("h2_presence.html"),
        )
        .unwrap();

        for name in ["h2_occurrences.html", "h2_first_round.html", "h2_presence.html"] {
            let html = fs::read_to_string(dir.join(name)).unwrap();
            assert!(html.contains("route"), "{} has no plot", name);
        }
    }

    #[test]
    fn unwritable_output_is_an_error() {
        let dir = test_dir("charts-unwritable");
        let output = dir.join("missing").join("h2_occurrences.html");
        let result = render_occurrences("h2", &route_counts(&rows()), &output);
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
