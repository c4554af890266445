use crate::shared::error::PrepError;

/// Fractional crop, one value per edge, each the fraction of that edge to
/// remove. All zeros means no cropping.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CropFactor {
    pub top: f64,
    pub bottom: f64,
    pub left: f64,
    pub right: f64,
}

impl CropFactor {
    pub fn new(top: f64, bottom: f64, left: f64, right: f64) -> Self {
        Self {
            top,
            bottom,
            left,
            right,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.top == 0.0 && self.bottom == 0.0 && self.left == 0.0 && self.right == 0.0
    }

    /// Fatal unless every fraction lies in [0, 1].
    pub fn validate(&self) -> Result<(), PrepError> {
        for v in [self.top, self.bottom, self.left, self.right] {
            if !(0.0..=1.0).contains(&v) {
                return Err(PrepError::InvalidCropFactor(v));
            }
        }
        Ok(())
    }

    /// Fraction of the width retained after cropping.
    pub fn retained_width(&self) -> f64 {
        1.0 - self.left - self.right
    }

    /// Fraction of the height retained after cropping.
    pub fn retained_height(&self) -> f64 {
        1.0 - self.top - self.bottom
    }
}

/// Frame-selection stage of a graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectStage {
    /// Keep exactly these 0-based frame indices.
    Frames(Vec<usize>),
    /// Keep one representative frame out of every `spacing` frames.
    Interval(usize),
}

/// Crop stage of a graph. Border cropping takes the same pixel margin off
/// all four edges regardless of image size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CropStage {
    Factor(CropFactor),
    BorderPixels(u32),
}

/// Declarative ffmpeg `-filter_complex` pipeline: optional select, optional
/// nearest-neighbor upscale, optional crop, then a split fanning out into one
/// scale branch per pyramid level. Validated before serialization so a
/// malformed graph is caught before the external process is spawned.
#[derive(Debug, Clone)]
pub struct FilterGraph {
    input_label: Option<String>,
    select: Option<SelectStage>,
    upscale: Option<u32>,
    crop: Option<CropStage>,
    num_downscales: u32,
    nearest_neighbor: bool,
}

impl FilterGraph {
    pub fn new(num_downscales: u32) -> Self {
        Self {
            input_label: None,
            select: None,
            upscale: None,
            crop: None,
            num_downscales,
            nearest_neighbor: false,
        }
    }

    /// Reads from a labeled input stream (e.g. `0:v`) instead of the default.
    pub fn input_label(mut self, label: &str) -> Self {
        self.input_label = Some(label.to_string());
        self
    }

    pub fn select(mut self, stage: SelectStage) -> Self {
        self.select = Some(stage);
        self
    }

    /// Integer nearest-neighbor upscale applied before any crop or downscale.
    pub fn upscale(mut self, factor: u32) -> Self {
        self.upscale = Some(factor);
        self
    }

    pub fn crop(mut self, stage: CropStage) -> Self {
        self.crop = Some(stage);
        self
    }

    /// Scale every fan-out branch with nearest-neighbor sampling. Required
    /// for label/depth-style data where interpolation would invent values.
    pub fn nearest_neighbor(mut self, enabled: bool) -> Self {
        self.nearest_neighbor = enabled;
        self
    }

    /// Branch labels in level order, for `-map` argument construction.
    pub fn output_labels(&self) -> Vec<String> {
        (0..=self.num_downscales)
            .map(|i| format!("[out{}]", i))
            .collect()
    }

    pub fn validate(&self) -> Result<(), PrepError> {
        match &self.select {
            Some(SelectStage::Frames(indices)) if indices.is_empty() => {
                return Err(PrepError::InvalidGraph(
                    "frame selection with no frames".to_string(),
                ));
            }
            Some(SelectStage::Interval(spacing)) if *spacing < 2 => {
                return Err(PrepError::InvalidGraph(format!(
                    "interval selection needs spacing >= 2, got {}",
                    spacing
                )));
            }
            _ => {}
        }
        if let Some(factor) = self.upscale {
            if factor < 2 {
                return Err(PrepError::InvalidGraph(format!(
                    "upscale factor must be >= 2, got {}",
                    factor
                )));
            }
        }
        match self.crop {
            Some(CropStage::Factor(f)) => {
                f.validate()
                    .map_err(|e| PrepError::InvalidGraph(e.to_string()))?;
                if f.retained_width() <= 0.0 || f.retained_height() <= 0.0 {
                    return Err(PrepError::InvalidGraph(
                        "crop fractions on opposing edges must sum below 1".to_string(),
                    ));
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Serializes to the `-filter_complex` string. Fails instead of emitting
    /// a graph the transcoder would reject.
    pub fn render(&self) -> Result<String, PrepError> {
        self.validate()?;

        let mut stages: Vec<String> = Vec::new();
        match &self.select {
            Some(SelectStage::Frames(indices)) => {
                let exprs: Vec<String> =
                    indices.iter().map(|i| format!("eq(n\\,{})", i)).collect();
                stages.push(format!("select='{}'", exprs.join("+")));
                stages.push("setpts=N/TB".to_string());
            }
            Some(SelectStage::Interval(spacing)) => {
                stages.push(format!("thumbnail={}", spacing));
                stages.push("setpts=N/TB".to_string());
            }
            None => {}
        }
        if let Some(factor) = self.upscale {
            stages.push(format!(
                "scale=iw*{}:ih*{}:flags=neighbor",
                factor, factor
            ));
        }
        match self.crop {
            Some(CropStage::Factor(f)) if !f.is_zero() => {
                stages.push(format!(
                    "crop=w=iw*{}:h=ih*{}:x=iw*{}:y=ih*{}",
                    f.retained_width(),
                    f.retained_height(),
                    f.left,
                    f.top
                ));
            }
            Some(CropStage::BorderPixels(px)) if px > 0 => {
                stages.push(format!("crop=iw-{}:ih-{}", px * 2, px * 2));
            }
            _ => {}
        }

        let n = self.num_downscales + 1;
        let nn_flag = if self.nearest_neighbor {
            ":flags=neighbor"
        } else {
            ""
        };
        let tees: String = (0..n).map(|i| format!("[t{}]", i)).collect();
        stages.push(format!("split={}{}", n, tees));

        let mut graph = String::new();
        if let Some(label) = &self.input_label {
            graph.push_str(&format!("[{}]", label));
        }
        graph.push_str(&stages.join(","));
        for i in 0..n {
            graph.push_str(&format!(
                ";[t{}]scale=iw/{}:ih/{}{}[out{}]",
                i,
                1u64 << i,
                1u64 << i,
                nn_flag,
                i
            ));
        }
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_pyramid_graph() {
        let graph = FilterGraph::new(2).render().unwrap();
        assert_eq!(
            graph,
            "split=3[t0][t1][t2];[t0]scale=iw/1:ih/1[out0];[t1]scale=iw/2:ih/2[out1];[t2]scale=iw/4:ih/4[out2]"
        );
    }

    #[test]
    fn test_selected_and_cropped_graph() {
        let graph = FilterGraph::new(1)
            .select(SelectStage::Frames(vec![0, 7]))
            .crop(CropStage::Factor(CropFactor::new(0.1, 0.1, 0.0, 0.0)))
            .render()
            .unwrap();
        assert!(graph.starts_with("select='eq(n\\,0)+eq(n\\,7)',setpts=N/TB,"));
        assert!(graph.contains("crop=w=iw*1:h=ih*0.8:x=iw*0:y=ih*0.1"));
        assert!(graph.contains("split=2[t0][t1]"));
    }

    #[test]
    fn test_interval_graph() {
        let graph = FilterGraph::new(0)
            .select(SelectStage::Interval(12))
            .render()
            .unwrap();
        assert!(graph.starts_with("thumbnail=12,setpts=N/TB,split=1[t0];"));
    }

    #[test]
    fn test_zero_crop_factor_omits_crop_stage() {
        let graph = FilterGraph::new(1)
            .crop(CropStage::Factor(CropFactor::default()))
            .render()
            .unwrap();
        assert!(!graph.contains("crop"));
    }

    #[test]
    fn test_zero_border_crop_is_a_noop() {
        let graph = FilterGraph::new(1)
            .crop(CropStage::BorderPixels(0))
            .render()
            .unwrap();
        assert!(!graph.contains("crop"));
    }

    #[test]
    fn test_upscale_and_border_crop_with_input_label() {
        let graph = FilterGraph::new(1)
            .input_label("0:v")
            .upscale(4)
            .crop(CropStage::BorderPixels(15))
            .nearest_neighbor(true)
            .render()
            .unwrap();
        assert!(graph.starts_with("[0:v]scale=iw*4:ih*4:flags=neighbor,crop=iw-30:ih-30,split=2"));
        assert!(graph.contains("[t1]scale=iw/2:ih/2:flags=neighbor[out1]"));
    }

    #[test]
    fn test_output_labels_match_levels() {
        let graph = FilterGraph::new(3);
        assert_eq!(graph.output_labels(), vec!["[out0]", "[out1]", "[out2]", "[out3]"]);
    }

    #[test]
    fn test_invalid_graphs_rejected() {
        assert!(FilterGraph::new(1)
            .select(SelectStage::Frames(vec![]))
            .render()
            .is_err());
        assert!(FilterGraph::new(1)
            .select(SelectStage::Interval(1))
            .render()
            .is_err());
        assert!(FilterGraph::new(1)
            .crop(CropStage::Factor(CropFactor::new(0.6, 0.6, 0.0, 0.0)))
            .render()
            .is_err());
        assert!(FilterGraph::new(1)
            .crop(CropStage::Factor(CropFactor::new(-0.1, 0.0, 0.0, 0.0)))
            .render()
            .is_err());
        assert!(FilterGraph::new(1).upscale(1).render().is_err());
    }
}
