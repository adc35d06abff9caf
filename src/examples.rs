//! Built-in sample flowcharts that can be quickly loaded from the UI.
//!
//! Samples are stored as Mermaid text and go through the regular parser, so
//! loading one behaves exactly like opening a `.mmd` file without a layout
//! comment: nodes are placed by the layered auto-layout.

use crate::error::ParseError;
use crate::mermaid::parse_mermaid;
use crate::types::Diagram;

/// Kinds of built-in samples available from the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExampleKind {
    /// Start -> decision -> two outcomes
    Decision,
    /// Request handling with retries, drawn left to right
    RetryLoop,
    /// A tour of every node shape and link style
    ShapeGallery,
}

/// Metadata for a single sample.
pub struct ExampleInfo {
    /// Stable identifier for the sample
    pub kind: ExampleKind,
    /// Human-friendly display name
    pub name: &'static str,
}

/// Returns all samples with their display names.
pub const fn all_examples() -> &'static [ExampleInfo] {
    const EXAMPLES: &[ExampleInfo] = &[
        ExampleInfo {
            kind: ExampleKind::Decision,
            name: "Simple Decision",
        },
        ExampleInfo {
            kind: ExampleKind::RetryLoop,
            name: "Retry Loop (left to right)",
        },
        ExampleInfo {
            kind: ExampleKind::ShapeGallery,
            name: "Shape and Link Gallery",
        },
    ];
    EXAMPLES
}

/// Mermaid source of a sample.
pub fn example_source(kind: ExampleKind) -> &'static str {
    match kind {
        ExampleKind::Decision => DECISION,
        ExampleKind::RetryLoop => RETRY_LOOP,
        ExampleKind::ShapeGallery => SHAPE_GALLERY,
    }
}

/// Builds a diagram for the given sample.
pub fn build_example(kind: ExampleKind) -> Result<Diagram, ParseError> {
    Ok(parse_mermaid(example_source(kind))?.into_diagram(None))
}

const DECISION: &str = "\
flowchart TD
    start([Start]) --> check{Is it working?}
    check -->|Yes| done[Great]
    check -->|No| fix[Fix it]
    fix --> check
    done --> stop(((Stop)))
";

const RETRY_LOOP: &str = "\
flowchart LR
    req[/Request/] --> call[[Call service]]
    call --> ok{Succeeded?}
    ok -- yes --> store[(Save result)]
    ok -- no --> wait(Back off)
    wait -.-> call
    store ==> reply>Reply sent]
";

const SHAPE_GALLERY: &str = "\
flowchart TD
    rect[Rectangle] --> round(Rounded)
    round --- stadium([Stadium])
    stadium -.-> sub[[Subroutine]]
    sub ==> db[(Database)]
    db --> circle((Circle))
    circle --> hex{{Hexagon}}
    hex --> io[/Input/]
    io --> out[\\Output\\]
    out --> trap[/Trapezoid\\]
    trap --> manual[\\Manual/]
    manual --> flag>Flag]
    flag --> decide{Decide}
    decide --> rect & round
";
