//! Final record assembly for the aligned output table.
//!
//! Combines corrected distances with per-attribute averages and deltas into
//! one wide table. The fitted pair contributes averaged attributes; a third
//! survey, not being part of the fit, contributes its raw values under a
//! year-suffixed name instead.

use crate::core::columns::ColumnKey;
use crate::core::loaders::survey_year;
use crate::core::table::SurveyTable;

use super::correction;
use super::drift::DriftModel;
use super::matching::MatchedTable;

/// One named numeric column of the aligned output.
#[derive(Debug, Clone)]
pub struct AlignedColumn {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

/// The assembled output table. The synthetic `id` column (sequential,
/// 1-based) is implicit and materialized by the writer.
#[derive(Debug, Clone)]
pub struct AlignedTable {
    pub num_rows: usize,
    pub columns: Vec<AlignedColumn>,
}

impl AlignedTable {
    /// Look up a column by exact name.
    pub fn column(&self, name: &str) -> Option<&AlignedColumn> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Column-name suffix for an unfitted survey: its year when one can be
/// read from the identifier, the identifier itself otherwise.
pub fn survey_suffix(survey_id: &str) -> String {
    survey_year(survey_id)
        .map(|y| y.to_string())
        .unwrap_or_else(|| survey_id.to_string())
}

/// Assemble the aligned table from a join, the fitted drift model, and the
/// participating surveys.
///
/// Emitted columns, in order: `distance_corrected`, the two raw fitted-pair
/// distances (`<id>__distance`), `distance__delta`, then `<key>__avg` and
/// `<key>__delta` for every tracked attribute both fitted surveys carry
/// (mean and signed second-minus-first delta; a missing side yields missing
/// derived cells), then for the tertiary survey its raw and corrected
/// distance plus raw attribute values under `<key>_<suffix>` names.
pub fn assemble(
    matched: &MatchedTable,
    primary: &SurveyTable,
    secondary: &SurveyTable,
    tertiary: Option<&SurveyTable>,
    model: &DriftModel,
) -> AlignedTable {
    let num_rows = matched.num_rows();
    let primary_rows: Vec<usize> = matched.rows.iter().map(|r| r.primary).collect();
    let secondary_rows: Vec<usize> = matched.rows.iter().map(|r| r.secondary).collect();

    let dist_primary: Vec<f64> = primary_rows.iter().map(|&i| primary.distance[i]).collect();
    let dist_secondary: Vec<f64> = secondary_rows
        .iter()
        .map(|&i| secondary.distance[i])
        .collect();

    let mut columns = Vec::new();

    columns.push(AlignedColumn {
        name: "distance_corrected".to_string(),
        values: correction::correct_all(model, &dist_primary)
            .into_iter()
            .map(Some)
            .collect(),
    });
    columns.push(AlignedColumn {
        name: format!("{}__distance", primary.id),
        values: dist_primary.iter().copied().map(Some).collect(),
    });
    columns.push(AlignedColumn {
        name: format!("{}__distance", secondary.id),
        values: dist_secondary.iter().copied().map(Some).collect(),
    });
    columns.push(AlignedColumn {
        name: "distance__delta".to_string(),
        values: dist_primary
            .iter()
            .zip(&dist_secondary)
            .map(|(a, b)| Some(b - a))
            .collect(),
    });

    for &key in ColumnKey::tracked_attributes() {
        let col_a = primary.attribute(key);
        let col_b = secondary.attribute(key);
        // Averaging needs the attribute on both sides; surveys with
        // different vocabularies simply skip the key.
        let (Some(col_a), Some(col_b)) = (col_a, col_b) else {
            continue;
        };

        let a: Vec<Option<f64>> = primary_rows.iter().map(|&i| col_a.values[i]).collect();
        let b: Vec<Option<f64>> = secondary_rows.iter().map(|&i| col_b.values[i]).collect();

        columns.push(AlignedColumn {
            name: format!("{}__avg", key.name()),
            values: a
                .iter()
                .zip(&b)
                .map(|(va, vb)| match (va, vb) {
                    (Some(va), Some(vb)) => Some((va + vb) / 2.0),
                    _ => None,
                })
                .collect(),
        });
        columns.push(AlignedColumn {
            name: format!("{}__delta", key.name()),
            values: a
                .iter()
                .zip(&b)
                .map(|(va, vb)| match (va, vb) {
                    (Some(va), Some(vb)) => Some(vb - va),
                    _ => None,
                })
                .collect(),
        });
    }

    if let Some(tertiary) = tertiary {
        let suffix = survey_suffix(&tertiary.id);
        let dist_t: Vec<Option<f64>> = matched
            .rows
            .iter()
            .map(|r| r.tertiary.map(|i| tertiary.distance[i]))
            .collect();

        columns.push(AlignedColumn {
            name: format!("distance_{}", suffix),
            values: dist_t.clone(),
        });
        columns.push(AlignedColumn {
            name: format!("distance_{}_corrected", suffix),
            values: correction::correct_optional(model, &dist_t),
        });

        for &key in ColumnKey::tracked_attributes() {
            let Some(col) = tertiary.attribute(key) else {
                continue;
            };
            columns.push(AlignedColumn {
                name: format!("{}_{}", key.name(), suffix),
                values: matched
                    .rows
                    .iter()
                    .map(|r| r.tertiary.and_then(|i| col.values[i]))
                    .collect(),
            });
        }
    }

    AlignedTable { num_rows, columns }
}

/// The fixed working-column drop list for the final (apply-stage) output.
///
/// Raw fitted-pair distances, the distance delta, thickness and joint-length
/// derivations, and the tertiary raw distance and thickness are working
/// columns; height derivations and the corrected tertiary distance stay.
pub fn final_drop_list(
    primary_id: &str,
    secondary_id: &str,
    tertiary_suffix: Option<&str>,
) -> Vec<String> {
    let mut drop = vec![
        format!("{}__distance", primary_id),
        format!("{}__distance", secondary_id),
        "distance__delta".to_string(),
        "thickness__avg".to_string(),
        "thickness__delta".to_string(),
        "jlength__avg".to_string(),
        "jlength__delta".to_string(),
    ];
    if let Some(suffix) = tertiary_suffix {
        drop.push(format!("distance_{}", suffix));
        drop.push(format!("thickness_{}", suffix));
    }
    drop
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::table::AttributeColumn;
    use crate::processors::drift::DriftModel;
    use crate::processors::matching::{attach_survey, match_pair, MATCH_TOLERANCE};

    fn survey(id: &str, distances: &[f64], attrs: &[(&str, &[Option<f64>])]) -> SurveyTable {
        SurveyTable {
            id: id.to_string(),
            distance: distances.to_vec(),
            attributes: attrs
                .iter()
                .map(|(header, values)| AttributeColumn {
                    name: format!("{}__{}", id, header),
                    source_header: header.to_string(),
                    values: values.to_vec(),
                })
                .collect(),
            rows_dropped: 0,
        }
    }

    fn fitted(a: &SurveyTable, b: &SurveyTable) -> (MatchedTable, DriftModel) {
        let m = match_pair(a, b, MATCH_TOLERANCE).unwrap();
        let model = DriftModel::from_pairs(&m.distance_pairs(a, b)).unwrap();
        (m, model)
    }

    #[test]
    fn test_assemble_pair_columns() {
        let a = survey(
            "r_2007",
            &[100.0, 200.0],
            &[("Height", &[Some(10.0), Some(20.0)])],
        );
        let b = survey(
            "r_2015",
            &[105.0, 203.0],
            &[("Elevation", &[Some(12.0), Some(22.0)])],
        );
        let (m, model) = fitted(&a, &b);

        let table = assemble(&m, &a, &b, None, &model);
        assert_eq!(table.num_rows, 2);

        // Anchors coincide with the corrected rows, so T(x) lands exactly
        // on the secondary frame.
        let corrected = table.column("distance_corrected").unwrap();
        assert_eq!(corrected.values, vec![Some(95.0), Some(197.0)]);

        assert_eq!(
            table.column("r_2007__distance").unwrap().values,
            vec![Some(100.0), Some(200.0)]
        );
        assert_eq!(
            table.column("distance__delta").unwrap().values,
            vec![Some(5.0), Some(3.0)]
        );
    }

    #[test]
    fn test_assemble_attribute_avg_delta() {
        let a = survey("a", &[100.0], &[("Height", &[Some(10.0)])]);
        let b = survey("b", &[100.0], &[("height", &[Some(12.0)])]);
        let (m, model) = fitted(&a, &b);

        let table = assemble(&m, &a, &b, None, &model);
        assert_eq!(table.column("height__avg").unwrap().values, vec![Some(11.0)]);
        assert_eq!(table.column("height__delta").unwrap().values, vec![Some(2.0)]);
    }

    #[test]
    fn test_assemble_missing_side_yields_missing_derivations() {
        let a = survey("a", &[100.0, 200.0], &[("t [in]", &[Some(0.25), None])]);
        let b = survey("b", &[100.0, 200.0], &[("Wt [in]", &[Some(0.35), Some(0.30)])]);
        let (m, model) = fitted(&a, &b);

        let table = assemble(&m, &a, &b, None, &model);
        let avg = table.column("thickness__avg").unwrap();
        assert_eq!(avg.values, vec![Some(0.30), None]);
    }

    #[test]
    fn test_assemble_skips_attribute_absent_on_one_side() {
        let a = survey("a", &[100.0], &[("Height", &[Some(1.0)])]);
        let b = survey("b", &[100.0], &[]);
        let (m, model) = fitted(&a, &b);

        let table = assemble(&m, &a, &b, None, &model);
        assert!(table.column("height__avg").is_none());
    }

    #[test]
    fn test_assemble_tertiary_columns() {
        let a = survey("r_2007", &[100.0, 200.0], &[]);
        let b = survey("r_2015", &[101.0, 201.0], &[]);
        let c = survey(
            "r_2022",
            &[102.0],
            &[("J. len [ft]", &[Some(40.0)]), ("Wt [in]", &[Some(0.5)])],
        );

        let (mut m, model) = fitted(&a, &b);
        attach_survey(&mut m, &a, &c, MATCH_TOLERANCE);

        let table = assemble(&m, &a, &b, Some(&c), &model);

        assert_eq!(
            table.column("distance_2022").unwrap().values,
            vec![Some(102.0), None]
        );
        // Raw tertiary attributes are carried through, never averaged,
        // and absent where the tertiary join missed.
        assert_eq!(
            table.column("jlength_2022").unwrap().values,
            vec![Some(40.0), None]
        );
        assert_eq!(
            table.column("thickness_2022").unwrap().values,
            vec![Some(0.5), None]
        );
        // Corrected with the model fitted on the 2007/2015 pair:
        // delta(102) = 1, corrected = 101.
        assert_eq!(
            table.column("distance_2022_corrected").unwrap().values,
            vec![Some(101.0), None]
        );
    }

    #[test]
    fn test_survey_suffix() {
        assert_eq!(survey_suffix("r_2022_weld"), "2022");
        assert_eq!(survey_suffix("survey_c"), "survey_c");
    }

    #[test]
    fn test_final_drop_list() {
        let drop = final_drop_list("r_2007", "r_2015", Some("2022"));
        assert!(drop.contains(&"r_2007__distance".to_string()));
        assert!(drop.contains(&"distance_2022".to_string()));
        assert!(!drop.contains(&"distance_2022_corrected".to_string()));
        assert!(!drop.contains(&"height__avg".to_string()));
    }
}
