use std::fs;
use std::io::Write;
use std::process::{Command, Stdio};

/// Run the layerplot binary with the given arguments, feeding `input` on stdin.
fn run_layerplot(args: &[&str], input: &str) -> Result<Vec<u8>, String> {
    let mut child = Command::new(env!("CARGO_BIN_EXE_layerplot"))
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| format!("Failed to spawn process: {}", e))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(input.as_bytes())
            .map_err(|e| format!("Failed to write to stdin: {}", e))?;
    }

    let output = child
        .wait_with_output()
        .map_err(|e| format!("Failed to wait for process: {}", e))?;

    if output.status.success() {
        Ok(output.stdout)
    } else {
        Err(String::from_utf8_lossy(&output.stderr).to_string())
    }
}

fn fixture(name: &str) -> String {
    fs::read_to_string(format!("test/{}", name)).expect("Failed to read test fixture")
}

/// Check if bytes are a valid PNG
fn is_valid_png(bytes: &[u8]) -> bool {
    bytes.len() > 8 && bytes[0..8] == [137, 80, 78, 71, 13, 10, 26, 10]
}

/// Width and height from the IHDR chunk.
fn png_size(bytes: &[u8]) -> (u32, u32) {
    let w = u32::from_be_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]);
    let h = u32::from_be_bytes([bytes[20], bytes[21], bytes[22], bytes[23]]);
    (w, h)
}

fn assert_png(result: Result<Vec<u8>, String>) {
    assert!(result.is_ok(), "Failed: {:?}", result.err());
    assert!(is_valid_png(&result.unwrap()), "Output is not a valid PNG");
}

#[test]
fn test_end_to_end_line_chart() {
    let result = run_layerplot(&["aes(x: date, y: temperature) | line()"], &fixture("timeseries.csv"));
    assert_png(result);
}

#[test]
fn test_end_to_end_scatter_plot() {
    let result = run_layerplot(
        &["aes(x: height, y: weight, color: species) | point(size: 4)"],
        &fixture("scatter.csv"),
    );
    assert_png(result);
}

#[test]
fn test_end_to_end_line_plus_points_by_city() {
    let result = run_layerplot(
        &[r#"aes(x: date, y: temperature, color: city) | line(linewidth: 2) | point(size: 5, shape: "square")"#],
        &fixture("timeseries.csv"),
    );
    assert_png(result);
}

#[test]
fn test_end_to_end_col_chart() {
    let result = run_layerplot(
        &[r#"aes(x: region, y: sales) | col(fill: "steelblue")"#],
        &fixture("sales.csv"),
    );
    assert_png(result);
}

#[test]
fn test_end_to_end_dodge_bars() {
    let result = run_layerplot(
        &["aes(x: region, y: sales, fill: quarter) | col(position: dodge)"],
        &fixture("sales.csv"),
    );
    assert_png(result);
}

#[test]
fn test_end_to_end_stack_bars() {
    let result = run_layerplot(
        &["aes(x: region, y: sales, fill: quarter) | col(position: stack) | coord_flip()"],
        &fixture("sales.csv"),
    );
    assert_png(result);
}

#[test]
fn test_end_to_end_histogram_and_density() {
    let csv = fixture("many_rows.csv");
    assert_png(run_layerplot(&["aes(x: y) | histogram(bins: 12)"], &csv));
    assert_png(run_layerplot(&["aes(x: y) | density(adjust: 0.5)"], &csv));
}

#[test]
fn test_end_to_end_faceted_svg() {
    let result = run_layerplot(
        &[
            r#"aes(x: date, y: temperature) | line() | facet_wrap(by: city, ncol: 2) | labs(title: "Winter") | theme_minimal()"#,
            "--format",
            "svg",
        ],
        &fixture("timeseries.csv"),
    );
    let bytes = result.expect("faceted SVG should render");
    let svg = String::from_utf8(bytes).expect("SVG output is UTF-8");
    assert!(svg.contains("<svg"));
    assert!(svg.contains("city = Oslo"));
    assert!(svg.contains("Winter"));
}

#[test]
fn test_end_to_end_json_input() {
    let result = run_layerplot(
        &["aes(x: group, y: value, fill: group) | boxplot()", "--json"],
        &fixture("measurements.json"),
    );
    assert_png(result);
}

#[test]
fn test_end_to_end_render_options() {
    let result = run_layerplot(
        &["aes(x: x, y: y) | point()", "--options", r#"{"width": 400, "height": 300}"#],
        "x,y\n1,10\n2,20\n",
    );
    let bytes = result.expect("render should succeed");
    assert!(is_valid_png(&bytes));
    assert_eq!(png_size(&bytes), (400, 300));
}

#[test]
fn test_end_to_end_width_flag_overrides_options() {
    let result = run_layerplot(
        &["aes(x: x, y: y) | point()", "--options", r#"{"width": 400}"#, "--width", "320"],
        "x,y\n1,10\n2,20\n",
    );
    let bytes = result.expect("render should succeed");
    assert_eq!(png_size(&bytes), (320, 600));
}

#[test]
fn test_end_to_end_input_and_output_files() {
    let dir = std::env::temp_dir().join(format!("layerplot-it-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    let output = dir.join("plot.svg");

    let result = run_layerplot(
        &[
            "aes(x: height, y: weight) | point()",
            "--input",
            "test/scatter.csv",
            "--output",
            output.to_str().unwrap(),
            "--format",
            "svg",
        ],
        "",
    );
    assert!(result.is_ok(), "Failed: {:?}", result.err());
    assert!(result.unwrap().is_empty());
    let svg = fs::read_to_string(&output).unwrap();
    assert!(svg.contains("<svg"));
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_end_to_end_invalid_syntax() {
    let result = run_layerplot(&["invalid syntax here"], "x,y\n1,10\n2,20\n");
    assert!(result.is_err(), "Should have failed with parse error");
    assert!(result.unwrap_err().contains("Parse error"));
}

#[test]
fn test_end_to_end_unknown_function() {
    let result = run_layerplot(&["aes(x: x, y: y) | sparkline()"], "x,y\n1,10\n2,20\n");
    assert!(result.unwrap_err().contains("Unknown function 'sparkline'"));
}

#[test]
fn test_end_to_end_column_not_found() {
    let result = run_layerplot(&["aes(x: x, y: y) | line()"], "a,b\n1,10\n2,20\n");
    assert!(result.is_err(), "Should have failed with column not found");
    assert!(result.unwrap_err().contains("not found"));
}

#[test]
fn test_end_to_end_unknown_aesthetic() {
    let result = run_layerplot(&["aes(x: x, glow: y) | point()"], "x,y\n1,10\n2,20\n");
    assert!(result.unwrap_err().contains("Invalid channel 'glow'"));
}

#[test]
fn test_end_to_end_log_scale_domain_error() {
    let result = run_layerplot(&["aes(x: x, y: y) | point() | scale_y_log10()"], &fixture("negative_values.csv"));
    assert!(result.unwrap_err().contains("Domain error"));
}

#[test]
fn test_end_to_end_manual_scale_missing_category() {
    let result = run_layerplot(
        &[r#"aes(x: region, y: sales, fill: region) | col() | scale_fill_manual(breaks: [north, south], values: ["red", "blue"])"#],
        &fixture("sales.csv"),
    );
    assert!(result.unwrap_err().contains("has no entry"));
}

#[test]
fn test_end_to_end_header_only_csv() {
    let result = run_layerplot(&["aes(x: x, y: y) | line()"], "x,y\n");
    assert_png(result);
}

#[test]
fn test_end_to_end_large_dataset() {
    assert_png(run_layerplot(&["aes(x: x, y: y) | line()"], &fixture("many_rows.csv")));
}

#[test]
fn test_end_to_end_negative_values() {
    assert_png(run_layerplot(
        &["aes(x: x, y: y) | area(alpha: 0.4) | line()"],
        &fixture("negative_values.csv"),
    ));
}

#[test]
fn test_end_to_end_unicode() {
    assert_png(run_layerplot(
        &[r#"aes(x: x, y: "température") | line()"#],
        &fixture("unicode.csv"),
    ));
}

#[test]
fn test_end_to_end_lollipop() {
    let result = run_layerplot(
        &["aes(x: item, y: score) | segment(xend: item, yend: base) | point(size: 5) | coord_flip()"],
        "item,score,base\napples,12,0\npears,7,0\nplums,15,0\n",
    );
    assert_png(result);
}
