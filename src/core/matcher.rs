use clap::ValueEnum;
use serde::Serialize;

/// Structure-from-motion tool the extracted pyramid is handed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SfmTool {
    Any,
    Colmap,
    Hloc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
pub enum FeatureType {
    #[value(name = "any")]
    #[serde(rename = "any")]
    Any,
    #[value(name = "sift")]
    #[serde(rename = "sift")]
    Sift,
    #[value(name = "superpoint")]
    #[serde(rename = "superpoint")]
    Superpoint,
    #[value(name = "superpoint_aachen")]
    #[serde(rename = "superpoint_aachen")]
    SuperpointAachen,
    #[value(name = "superpoint_max")]
    #[serde(rename = "superpoint_max")]
    SuperpointMax,
    #[value(name = "superpoint_inloc")]
    #[serde(rename = "superpoint_inloc")]
    SuperpointInloc,
    #[value(name = "r2d2")]
    #[serde(rename = "r2d2")]
    R2d2,
    #[value(name = "d2net-ss")]
    #[serde(rename = "d2net-ss")]
    D2netSs,
    #[value(name = "sosnet")]
    #[serde(rename = "sosnet")]
    Sosnet,
    #[value(name = "disk")]
    #[serde(rename = "disk")]
    Disk,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
pub enum MatcherType {
    #[value(name = "any")]
    #[serde(rename = "any")]
    Any,
    #[value(name = "NN")]
    #[serde(rename = "NN")]
    Nn,
    #[value(name = "superglue")]
    #[serde(rename = "superglue")]
    Superglue,
    #[value(name = "superglue-fast")]
    #[serde(rename = "superglue-fast")]
    SuperglueFast,
    #[value(name = "NN-superpoint")]
    #[serde(rename = "NN-superpoint")]
    NnSuperpoint,
    #[value(name = "NN-ratio")]
    #[serde(rename = "NN-ratio")]
    NnRatio,
    #[value(name = "NN-mutual")]
    #[serde(rename = "NN-mutual")]
    NnMutual,
    #[value(name = "adalam")]
    #[serde(rename = "adalam")]
    Adalam,
    #[value(name = "disk+lightglue")]
    #[serde(rename = "disk+lightglue")]
    DiskLightglue,
    #[value(name = "superpoint+lightglue")]
    #[serde(rename = "superpoint+lightglue")]
    SuperpointLightglue,
}

/// A fully resolved (tool, feature, matcher) triple, ready to hand to the
/// SfM stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MatcherCombination {
    pub sfm_tool: SfmTool,
    pub feature_type: FeatureType,
    pub matcher_type: MatcherType,
}

/// Replaces `any` wildcards with usable values and rejects combinations no
/// tool supports. Pure function: either a fully concrete valid combination
/// or `None`, never a partial result.
pub fn find_tool_feature_matcher_combination(
    sfm_tool: SfmTool,
    feature_type: FeatureType,
    matcher_type: MatcherType,
) -> Option<MatcherCombination> {
    let sfm_tool = if sfm_tool == SfmTool::Any {
        let colmap_feature = matches!(feature_type, FeatureType::Any | FeatureType::Sift);
        let colmap_matcher = matches!(matcher_type, MatcherType::Any | MatcherType::Nn);
        if colmap_feature && colmap_matcher {
            SfmTool::Colmap
        } else {
            SfmTool::Hloc
        }
    } else {
        sfm_tool
    };

    match sfm_tool {
        SfmTool::Colmap => {
            if !matches!(feature_type, FeatureType::Any | FeatureType::Sift)
                || !matches!(matcher_type, MatcherType::Any | MatcherType::Nn)
            {
                return None;
            }
            Some(MatcherCombination {
                sfm_tool: SfmTool::Colmap,
                feature_type: FeatureType::Sift,
                matcher_type: MatcherType::Nn,
            })
        }
        SfmTool::Hloc => {
            let feature_type = match feature_type {
                FeatureType::Any | FeatureType::Superpoint => FeatureType::SuperpointAachen,
                other => other,
            };
            let matcher_type = match matcher_type {
                MatcherType::Any => MatcherType::SuperpointLightglue,
                MatcherType::Nn => MatcherType::NnMutual,
                other => other,
            };
            Some(MatcherCombination {
                sfm_tool: SfmTool::Hloc,
                feature_type,
                matcher_type,
            })
        }
        SfmTool::Any => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(
        t: SfmTool,
        f: FeatureType,
        m: MatcherType,
    ) -> Option<(SfmTool, FeatureType, MatcherType)> {
        find_tool_feature_matcher_combination(t, f, m)
            .map(|c| (c.sfm_tool, c.feature_type, c.matcher_type))
    }

    #[test]
    fn test_all_wildcards_resolve_to_colmap() {
        assert_eq!(
            resolve(SfmTool::Any, FeatureType::Any, MatcherType::Any),
            Some((SfmTool::Colmap, FeatureType::Sift, MatcherType::Nn))
        );
    }

    #[test]
    fn test_hloc_wildcards_get_defaults() {
        assert_eq!(
            resolve(SfmTool::Hloc, FeatureType::Any, MatcherType::Any),
            Some((
                SfmTool::Hloc,
                FeatureType::SuperpointAachen,
                MatcherType::SuperpointLightglue
            ))
        );
        assert_eq!(
            resolve(SfmTool::Hloc, FeatureType::Superpoint, MatcherType::Nn),
            Some((
                SfmTool::Hloc,
                FeatureType::SuperpointAachen,
                MatcherType::NnMutual
            ))
        );
    }

    #[test]
    fn test_hloc_explicit_values_pass_through() {
        assert_eq!(
            resolve(SfmTool::Hloc, FeatureType::Disk, MatcherType::DiskLightglue),
            Some((SfmTool::Hloc, FeatureType::Disk, MatcherType::DiskLightglue))
        );
    }

    #[test]
    fn test_colmap_rejects_unsupported_features() {
        assert_eq!(
            resolve(SfmTool::Colmap, FeatureType::Superpoint, MatcherType::Any),
            None
        );
        assert_eq!(
            resolve(SfmTool::Colmap, FeatureType::Sift, MatcherType::Superglue),
            None
        );
    }

    #[test]
    fn test_any_tool_falls_back_to_hloc_for_non_colmap_inputs() {
        assert_eq!(
            resolve(SfmTool::Any, FeatureType::Superpoint, MatcherType::Any),
            Some((
                SfmTool::Hloc,
                FeatureType::SuperpointAachen,
                MatcherType::SuperpointLightglue
            ))
        );
        assert_eq!(
            resolve(SfmTool::Any, FeatureType::Any, MatcherType::Superglue),
            Some((
                SfmTool::Hloc,
                FeatureType::SuperpointAachen,
                MatcherType::Superglue
            ))
        );
    }

    #[test]
    fn test_resolver_is_total_and_never_partial() {
        for &t in SfmTool::value_variants() {
            for &f in FeatureType::value_variants() {
                for &m in MatcherType::value_variants() {
                    if let Some(c) = find_tool_feature_matcher_combination(t, f, m) {
                        assert_ne!(c.sfm_tool, SfmTool::Any);
                        assert_ne!(c.feature_type, FeatureType::Any);
                        assert_ne!(c.matcher_type, MatcherType::Any);
                    }
                }
            }
        }
    }
}
