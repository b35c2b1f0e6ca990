    use super::*;
    use crate::features::tests::record;
    use crate::schema::{DataType, MeasurementRecord, MemoryLayout, parse_config_str};
    use crate::solver::{HouseholderQr, NormalEquations};

    fn num_tiles_config() -> PipelineConfig {
        parse_config_str(
            "name: add\nkey: [INPUT_0_MEMORY, INPUT_1_MEMORY, INPUT_0_DATATYPE]\nfeatures: [num_tiles]\n",
        )
        .unwrap()
    }

    fn keyed(memory: MemoryLayout, tiles: u64, duration_ns: f64) -> MeasurementRecord {
        let mut r = record(32, 32 * tiles, 1, duration_ns);
        r.input_0_memory = memory;
        r.input_1_memory = memory;
        r
    }

    fn two_group_dataset() -> Dataset {
        Dataset {
            records: vec![
                keyed(MemoryLayout::DramInterleaved, 1, 100.0),
                keyed(MemoryLayout::DramInterleaved, 2, 200.0),
                keyed(MemoryLayout::L1Interleaved, 1, 50.0),
                keyed(MemoryLayout::L1Interleaved, 2, 150.0),
            ],
            ..Dataset::default()
        }
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!((actual - expected).abs() < 1e-9, "{actual} vs {expected}");
    }

    #[test]
    fn two_group_fit() {
        let outcome = fit(&two_group_dataset(), &num_tiles_config(), &HouseholderQr);
        assert!(outcome.diagnostics.is_empty());
        assert_eq!(outcome.table.len(), 2);

        let mut entries = outcome.table.entries.values();
        let dram = entries.next().unwrap();
        assert_close(dram.intercept, 0.0);
        assert_close(dram.slopes[0], 100.0);
        let l1 = entries.next().unwrap();
        assert_close(l1.intercept, -50.0);
        assert_close(l1.slopes[0], 100.0);
    }

    #[test]
    fn two_group_fit_with_normal_equations() {
        let outcome = fit(&two_group_dataset(), &num_tiles_config(), &NormalEquations);
        let l1 = outcome.table.entries.values().nth(1).unwrap();
        assert_close(l1.intercept, -50.0);
        assert_close(l1.slopes[0], 100.0);
    }

    #[test]
    fn single_row_group_is_unfittable() {
        let mut ds = two_group_dataset();
        let mut c = keyed(MemoryLayout::DramInterleaved, 3, 300.0);
        c.input_0_datatype = DataType::Bfloat4B;
        ds.records.push(c);

        let outcome = fit(&ds, &num_tiles_config(), &HouseholderQr);
        assert_eq!(outcome.table.len(), 2);
        assert_eq!(outcome.diagnostics.len(), 1);
        let d = &outcome.diagnostics[0];
        assert_eq!(d.rule, "UNFITTABLE");
        assert!(d.message.contains("DRAM_INTERLEAVED/DRAM_INTERLEAVED/BFLOAT4_B"));
    }

    #[test]
    fn rank_deficient_group_is_ill_conditioned() {
        let ds = Dataset {
            records: vec![
                keyed(MemoryLayout::DramInterleaved, 2, 100.0),
                keyed(MemoryLayout::DramInterleaved, 2, 120.0),
                keyed(MemoryLayout::DramInterleaved, 2, 110.0),
            ],
            ..Dataset::default()
        };
        let outcome = fit(&ds, &num_tiles_config(), &HouseholderQr);
        assert!(outcome.table.is_empty());
        assert_eq!(outcome.diagnostics.len(), 1);
        assert_eq!(outcome.diagnostics[0].rule, "ILL-CONDITIONED");
    }

    #[test]
    fn rejected_rows_are_counted_not_fitted() {
        let mut ds = two_group_dataset();
        let mut zero = keyed(MemoryLayout::DramInterleaved, 3, 999.0);
        zero.core_count = 0;
        ds.records.push(zero);
        let outcome = fit(&ds, &num_tiles_config(), &HouseholderQr);
        assert_eq!(outcome.rejected, 1);
        let dram = outcome.table.entries.values().next().unwrap();
        assert_close(dram.slopes[0], 100.0);
    }

    #[test]
    fn coefficient_csv_layout() {
        let outcome = fit(&two_group_dataset(), &num_tiles_config(), &HouseholderQr);
        let mut buf = Vec::new();
        outcome.table.write_csv(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("INPUT_0_MEMORY,INPUT_1_MEMORY,INPUT_0_DATATYPE,intercept,num_tiles_coef")
        );
        assert!(lines.next().unwrap().starts_with("DRAM_INTERLEAVED,DRAM_INTERLEAVED,BFLOAT16,"));
        assert!(lines.next().unwrap().starts_with("L1_INTERLEAVED,L1_INTERLEAVED,BFLOAT16,"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn coefficient_csv_reads_back() {
        let config = num_tiles_config();
        let outcome = fit(&two_group_dataset(), &config, &HouseholderQr);
        let mut buf = Vec::new();
        outcome.table.write_csv(&mut buf).unwrap();
        let loaded = CoefficientTable::read_csv(buf.as_slice(), "coeffs.csv", &config).unwrap();
        assert_eq!(loaded, outcome.table);
    }

    #[test]
    fn coefficient_csv_missing_feature_column() {
        let mut config = num_tiles_config();
        config.features.push(FeatureKind::CoreCount);
        let text = "INPUT_0_MEMORY,INPUT_1_MEMORY,INPUT_0_DATATYPE,intercept,num_tiles_coef\n";
        let err = CoefficientTable::read_csv(text.as_bytes(), "coeffs.csv", &config).unwrap_err();
        match err {
            PerfModelError::MissingColumns { columns, .. } => {
                assert_eq!(columns, vec!["core_count_coef".to_string()]);
            }
            other => panic!("expected MissingColumns, got {other:?}"),
        }
    }

    #[test]
    fn coefficient_csv_extra_feature_column() {
        let config = num_tiles_config();
        let text = "INPUT_0_MEMORY,INPUT_1_MEMORY,INPUT_0_DATATYPE,intercept,num_tiles_coef,tiles_coef\n";
        let err = CoefficientTable::read_csv(text.as_bytes(), "coeffs.csv", &config).unwrap_err();
        assert!(matches!(err, PerfModelError::InvalidInput(_)));
        assert!(err.to_string().contains("do not match"));
    }

    #[test]
    fn coefficient_csv_duplicate_key() {
        let config = num_tiles_config();
        let text = "INPUT_0_MEMORY,INPUT_1_MEMORY,INPUT_0_DATATYPE,intercept,num_tiles_coef\n\
                    L1_INTERLEAVED,L1_INTERLEAVED,BFLOAT16,1,2\n\
                    L1_INTERLEAVED,L1_INTERLEAVED,BFLOAT16,3,4\n";
        let err = CoefficientTable::read_csv(text.as_bytes(), "coeffs.csv", &config).unwrap_err();
        assert!(err.to_string().contains("duplicate key"));
    }

    #[test]
    fn coefficient_csv_bad_number() {
        let config = num_tiles_config();
        let text = "INPUT_0_MEMORY,INPUT_1_MEMORY,INPUT_0_DATATYPE,intercept,num_tiles_coef\n\
                    L1_INTERLEAVED,L1_INTERLEAVED,BFLOAT16,one,2\n";
        let err = CoefficientTable::read_csv(text.as_bytes(), "coeffs.csv", &config).unwrap_err();
        assert!(err.to_string().contains("coeffs.csv:2"));
    }

    #[test]
    fn coefficient_csv_error_line_counts_blank_lines() {
        let config = num_tiles_config();
        let text = "INPUT_0_MEMORY,INPUT_1_MEMORY,INPUT_0_DATATYPE,intercept,num_tiles_coef\n\
                    DRAM_INTERLEAVED,DRAM_INTERLEAVED,BFLOAT16,1,2\n\
                    \n\
                    L1_INTERLEAVED,L1_INTERLEAVED,BFLOAT16,one,2\n";
        let err = CoefficientTable::read_csv(text.as_bytes(), "coeffs.csv", &config).unwrap_err();
        assert!(err.to_string().contains("coeffs.csv:4:"), "{err}");
    }

    #[test]
    fn estimate_applies_intercept_and_slopes() {
        let c = Coefficients {
            intercept: 10.0,
            slopes: vec![2.0, 0.5],
        };
        assert_close(c.estimate(&[3.0, 4.0]), 18.0);
    }
