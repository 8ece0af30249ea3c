/// What a layout pass is for.
///
/// All modes run the same layout arithmetic; they only differ in which side
/// effects the [`Capabilities`] allow.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ComputeMode {
    /// Whole-book indexing: page starts only.
    #[default]
    Location,
    /// Fast-forward to an arbitrary offset: metrics only.
    Move,
    /// Single-page rendering: display list, bitmaps and painting.
    Display,
}

/// Side effects a compute mode permits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Capabilities {
    /// Append display-list entries.
    pub emit: bool,
    /// Fetch glyph bitmaps from the font engine.
    pub rasterize: bool,
    /// Hand the display list to a driver.
    pub paint: bool,
}

impl ComputeMode {
    pub const fn capabilities(self) -> Capabilities {
        match self {
            Self::Location | Self::Move => Capabilities {
                emit: false,
                rasterize: false,
                paint: false,
            },
            Self::Display => Capabilities {
                emit: true,
                rasterize: true,
                paint: true,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_display_has_side_effects() {
        assert_eq!(ComputeMode::Location.capabilities(), Capabilities::default());
        assert_eq!(ComputeMode::Move.capabilities(), Capabilities::default());
        let display = ComputeMode::Display.capabilities();
        assert!(display.emit && display.rasterize && display.paint);
    }
}
