use std::io::Write;

use logcluster_rs::{Config, Engine, RunStats};
use tempfile::NamedTempFile;

fn input_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn config_for(file: &NamedTempFile, support: u64) -> Config {
    Config {
        support,
        inputs: vec![file.path().to_path_buf()],
        ..Config::default()
    }
}

fn run(config: Config) -> (String, RunStats) {
    let mut engine = Engine::new(config).unwrap();
    let mut out = Vec::new();
    let stats = engine.run(&mut out).unwrap();
    (String::from_utf8(out).unwrap(), stats)
}

mod test_table {
    use logcluster_rs::ElemTable;

    #[test]
    fn insert_counts_occurrences() {
        let mut table = ElemTable::new(1024, 7);
        let idx = table.insert(b"eth0");
        table.insert(b"eth0");
        table.insert(b"eth1");
        assert_eq!(table.entry(idx).count(), 2);
        assert_eq!(table.find(b"eth0"), Some(idx));
        assert_eq!(table.find(b"lo"), None);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn sweep_renumbers_densely() {
        // A tiny table forces chain collisions, so the sweep has to relink.
        let mut table = ElemTable::new(4, 3);
        for _ in 0..3 {
            table.insert(b"alpha");
        }
        table.insert(b"beta");
        for _ in 0..5 {
            table.insert(b"gamma");
        }
        table.insert(b"delta");
        table.insert(b"delta");

        let frequent = table.sweep_below(2);
        assert_eq!(frequent, 3);
        assert_eq!(table.find(b"beta"), None);

        let mut numbers = Vec::new();
        for key in [b"alpha".as_slice(), b"gamma", b"delta"] {
            let idx = table.find(key).unwrap();
            numbers.push(table.entry(idx).number());
        }
        numbers.sort();
        assert_eq!(numbers, vec![1, 2, 3]);
    }
}

mod test_segments {
    use std::io::Cursor;

    use logcluster_rs::{Segments, MAX_LINE_LEN};

    #[test]
    fn strips_one_trailing_newline() {
        let mut segments = Segments::new(Cursor::new(b"abc\n\nxyz".to_vec()));
        assert_eq!(segments.next_segment().unwrap().unwrap(), b"abc");
        assert_eq!(segments.next_segment().unwrap().unwrap(), b"");
        assert_eq!(segments.next_segment().unwrap().unwrap(), b"xyz");
        assert!(segments.next_segment().unwrap().is_none());
    }

    #[test]
    fn long_lines_come_out_in_segments() {
        let mut data = vec![b'x'; MAX_LINE_LEN + 100];
        data.push(b'\n');
        data.extend_from_slice(b"tail\n");
        let mut segments = Segments::new(Cursor::new(data));
        assert_eq!(
            segments.next_segment().unwrap().unwrap().len(),
            MAX_LINE_LEN - 1
        );
        assert_eq!(segments.next_segment().unwrap().unwrap().len(), 101);
        assert_eq!(segments.next_segment().unwrap().unwrap(), b"tail");
        assert!(segments.next_segment().unwrap().is_none());
    }
}

mod test_pipeline {
    use logcluster_rs::{LinePipeline, MAX_WORDS};

    fn tokens(pipeline: &LinePipeline, line: &[u8]) -> Vec<Vec<u8>> {
        let mut out = Vec::new();
        pipeline.tokenize(line, &mut out);
        out
    }

    #[test]
    fn splits_on_separator_runs() {
        let pipeline = LinePipeline::new("[ ]+", 0, None, None).unwrap();
        assert_eq!(
            tokens(&pipeline, b"a b  c"),
            vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]
        );
        // A leading separator yields an empty token, a trailing one none.
        assert_eq!(tokens(&pipeline, b" a"), vec![b"".to_vec(), b"a".to_vec()]);
        assert_eq!(tokens(&pipeline, b"a "), vec![b"a".to_vec()]);
        assert_eq!(tokens(&pipeline, b""), Vec::<Vec<u8>>::new());
    }

    #[test]
    fn byte_offset_drops_prefix() {
        let pipeline = LinePipeline::new("[ ]+", 4, None, None).unwrap();
        assert_eq!(
            tokens(&pipeline, b"xxxxhello world"),
            vec![b"hello".to_vec(), b"world".to_vec()]
        );
        assert_eq!(tokens(&pipeline, b"abc"), Vec::<Vec<u8>>::new());
    }

    #[test]
    fn filter_rejects_non_matching_lines() {
        let pipeline =
            LinePipeline::new("[ ]+", 0, Some(r"sshd\[[0-9]+\]: (.+)"), None).unwrap();
        assert!(tokens(&pipeline, b"cron[1]: job done").is_empty());
        assert_eq!(
            tokens(&pipeline, b"sshd[123]: session opened").len(),
            3
        );
    }

    #[test]
    fn template_substitutes_match_variables() {
        let pipeline =
            LinePipeline::new("[ ]+", 0, Some(r"sshd\[[0-9]+\]: (.+)"), Some("$1")).unwrap();
        assert_eq!(
            tokens(&pipeline, b"sshd[123]: session opened"),
            vec![b"session".to_vec(), b"opened".to_vec()]
        );

        let named =
            LinePipeline::new("[ ]+", 0, Some(r"user (?P<who>[a-z]+)"), Some("login ${who}"))
                .unwrap();
        assert_eq!(
            tokens(&named, b"user bob"),
            vec![b"login".to_vec(), b"bob".to_vec()]
        );
    }

    #[test]
    fn word_count_is_capped() {
        let pipeline = LinePipeline::new("[ ]+", 0, None, None).unwrap();
        let line = vec![&b"w"[..]; MAX_WORDS + 88].join(&b" "[..]);
        assert_eq!(tokens(&pipeline, &line).len(), MAX_WORDS);
    }
}

mod test_transform {
    use logcluster_rs::WordTransform;

    #[test]
    fn rewrites_every_match() {
        let transform = WordTransform::new("[.]", "[0-9]+", "N").unwrap();
        assert!(transform.applies(b"10.0.0.1"));
        assert_eq!(transform.rewrite(b"10.0.0.1"), b"N.N.N.N");
    }

    #[test]
    fn both_expressions_must_match() {
        let transform = WordTransform::new("[.]", "[0-9]+", "N").unwrap();
        assert!(!transform.applies(b"eth4"));
        assert!(!transform.applies(b"a.b"));
    }

    #[test]
    fn replacement_matching_its_own_search_terminates() {
        let transform = WordTransform::new("=", "=.+", "=VALUE").unwrap();
        assert_eq!(transform.rewrite(b"key=abc"), b"key=VALUE");
        assert_eq!(transform.rewrite(b"key=VALUE"), b"key=VALUE");
    }
}

mod test_clusters {
    use super::{config_for, input_file, run};

    #[test]
    fn constant_only_cluster() {
        let file = input_file(&"A B C\n".repeat(3));
        let (out, stats) = run(config_for(&file, 3));
        assert_eq!(out, "\nA B C \nSupport : 3\n\n\n");
        assert_eq!(stats.frequent_words, 3);
        assert_eq!(stats.clusters, 1);
    }

    #[test]
    fn fixed_width_gap() {
        let file = input_file("A X B\nA Y B\n");
        let (out, _) = run(config_for(&file, 2));
        assert_eq!(out, "\nA *{1,1} B \nSupport : 2\n\n\n");
    }

    #[test]
    fn variable_width_gap() {
        let file = input_file("A B\nA X B\nA X Y B\n");
        let (out, _) = run(config_for(&file, 3));
        assert_eq!(out, "\nA *{0,2} B \nSupport : 3\n\n\n");
    }

    #[test]
    fn aggregation_adds_more_specific_supports() {
        let mut content = "A eth0 down\n".repeat(10);
        content.push_str(&"A eth1 down\n".repeat(5));
        for i in 0..20 {
            content.push_str(&format!("A mid{i} down\n"));
        }
        let file = input_file(&content);

        let mut config = config_for(&file, 5);
        config.aggregate_supports = true;
        let (out, stats) = run(config);
        assert_eq!(
            out,
            "\nA *{1,1} down \nSupport : 35\n\n\
             A eth0 down \nSupport : 10\n\n\
             A eth1 down \nSupport : 5\n\n\n"
        );
        assert_eq!(stats.clusters, 3);

        // Without aggregation the generic pattern keeps its own support.
        let (out, _) = run(config_for(&file, 5));
        assert!(out.contains("A *{1,1} down \nSupport : 20\n"));
    }

    #[test]
    fn by_constants_output_mode() {
        let file = input_file("A B\nC D E\nA B\nC D E\n");
        let mut config = config_for(&file, 2);
        config.output_mode = logcluster_rs::OutputMode::ByConstants;
        let (out, _) = run(config);
        assert_eq!(
            out,
            "\nA B \nSupport : 2\n\nC D E \nSupport : 2\n\n\n"
        );
    }

    #[test]
    fn word_transform_builds_synthetic_constants() {
        let content = format!("{}{}", "ip 10.0.0.1\n".repeat(5), "ip 10.0.0.2\n".repeat(5));
        let file = input_file(&content);
        let mut config = config_for(&file, 10);
        config.word_filter = Some("[.]".to_owned());
        config.word_search = Some("[0-9]+".to_owned());
        config.word_replace = Some("N".to_owned());
        let (out, _) = run(config);
        assert_eq!(out, "\nip N.N.N.N \nSupport : 10\n\n\n");
    }

    #[test]
    fn sketches_do_not_change_the_result() {
        let file = input_file("A B\nA X B\nA X Y B\n");
        let (plain, _) = run(config_for(&file, 3));

        let mut with_word_sketch = config_for(&file, 3);
        with_word_sketch.word_sketch_size = 4096;
        let (sketched, _) = run(with_word_sketch);
        assert_eq!(plain, sketched);

        let mut with_cluster_sketch = config_for(&file, 3);
        with_cluster_sketch.cluster_sketch_size = 4096;
        let (sketched, _) = run(with_cluster_sketch);
        assert_eq!(plain, sketched);
    }

    #[test]
    fn relative_support_matches_absolute() {
        let file = input_file("A B\nA B\nC D\nC D\n");
        let (absolute, abs_stats) = run(config_for(&file, 2));

        let mut config = config_for(&file, 0);
        config.rel_support = 50.0;
        let (relative, rel_stats) = run(config);
        assert_eq!(absolute, relative);
        assert_eq!(abs_stats.support, rel_stats.support);
    }

    #[test]
    fn identical_runs_are_bit_identical() {
        let mut content = "A eth0 down\n".repeat(10);
        content.push_str(&"A eth1 down\n".repeat(5));
        for i in 0..20 {
            content.push_str(&format!("A mid{i} down\n"));
        }
        let file = input_file(&content);
        let mut config = config_for(&file, 5);
        config.aggregate_supports = true;
        config.word_weight_threshold = 0.1;
        let (first, _) = run(config.clone());
        let (second, _) = run(config);
        assert_eq!(first, second);
    }

    #[test]
    fn no_frequent_words_means_no_clusters() {
        let file = input_file("x y z\n");
        let (out, stats) = run(config_for(&file, 5));
        assert_eq!(out, "");
        assert_eq!(stats.frequent_words, 0);
        assert_eq!(stats.clusters, 0);
    }

    #[test]
    fn overlong_lines_are_truncated_not_invented() {
        let line = vec!["w"; 600].join(" ");
        let file = input_file(&format!("{line}\n{line}\n{line}\n"));
        let (out, stats) = run(config_for(&file, 3));
        assert_eq!(stats.clusters, 1);
        assert!(out.contains(&format!("\n{}\n", "w ".repeat(512))));
    }

    #[test]
    fn unreadable_inputs_are_skipped() {
        let file = input_file(&"A B C\n".repeat(3));
        let mut config = config_for(&file, 3);
        config
            .inputs
            .insert(0, "/nonexistent/logcluster-input".into());
        let (out, _) = run(config);
        assert!(out.contains("A B C \nSupport : 3\n"));
    }
}

mod test_join {
    use logcluster_rs::OutputMode;

    use super::{config_for, input_file, run};

    #[test]
    fn low_weight_words_become_tokens() {
        let content = format!(
            "{}{}",
            "Interface eth0 unstable\n".repeat(20),
            "Interface eth1 unstable\n".repeat(20)
        );
        let file = input_file(&content);
        let mut config = config_for(&file, 20);
        config.word_weight_threshold = 0.75;
        let (out, stats) = run(config);
        assert_eq!(out, "\nInterface (eth0|eth1) unstable \nSupport : 40\n\n\n");
        assert_eq!(stats.joined_input, 2);
        assert_eq!(stats.joined_output, 1);
    }

    #[test]
    fn single_word_token_prints_bare_unless_detailed() {
        let content = format!("{}{}", "X A\n".repeat(5), "X B\n".repeat(15));
        let file = input_file(&content);

        let mut config = config_for(&file, 5);
        config.word_weight_threshold = 0.7;
        let (out, _) = run(config.clone());
        assert_eq!(
            out,
            "\nX B \nSupport : 15\n\nX A \nSupport : 5\n\n\n"
        );

        config.detail_token = true;
        let (out, _) = run(config);
        assert_eq!(
            out,
            "\nX B \nSupport : 15\n\nX (A) \nSupport : 5\n\n\n"
        );
    }

    #[test]
    fn by_constants_mode_prints_two_sections() {
        let content = format!("{}{}", "X A\n".repeat(5), "X B\n".repeat(15));
        let file = input_file(&content);
        let mut config = config_for(&file, 5);
        config.word_weight_threshold = 0.7;
        config.output_mode = OutputMode::ByConstants;
        let (out, _) = run(config);
        assert_eq!(
            out,
            "\n>>>>>>The 1 clusters that are not joined:\n\n\
             X B \nSupport : 15\n\n\
             >>>>>>The 1 joined clusters:\n\n\
             X A \nSupport : 5\n\n\n"
        );
    }

    #[test]
    fn weight_function_two_uses_unique_words() {
        // One repeated constant: with weightf=2 the repeated word counts
        // once, and a single-unique-word candidate has weight 1.
        let content = format!("{}{}", "ping ping\n".repeat(10), "ping pong\n".repeat(10));
        let file = input_file(&content);
        let mut config = config_for(&file, 10);
        config.word_weight_threshold = 0.6;
        config.word_weight_function = 2;
        let (out, stats) = run(config);
        // "ping ping" has p=1, weight 1 everywhere: never joined.
        assert!(out.contains("ping ping \nSupport : 10\n"));
        // In "ping pong": weight(pong) = (dep(ping,pong)+dep(pong,pong)-1)/1 = 0.5 < 0.6,
        // weight(ping) = (1+1-1)/1 = 1: pong becomes a token.
        assert!(out.contains("ping pong \nSupport : 10\n"));
        assert_eq!(stats.joined_input, 1);
        assert_eq!(stats.joined_output, 1);
    }
}

mod test_outliers {
    use super::{config_for, input_file, run};

    #[test]
    fn non_matching_lines_are_written_out() {
        let file = input_file("A B\nA B\nA B\nnoise junk\n\n");
        let outliers = tempfile::NamedTempFile::new().unwrap();
        let mut config = config_for(&file, 2);
        config.outliers = Some(outliers.path().to_path_buf());
        let (_, stats) = run(config);
        assert_eq!(stats.outliers, Some(2));
        assert_eq!(std::fs::read(outliers.path()).unwrap(), b"noise junk\n\n");
    }

    #[test]
    fn transformed_lines_match_their_cluster() {
        let content = format!("{}{}", "ip 10.0.0.1\n".repeat(5), "ip 10.0.0.2\n".repeat(5));
        let file = input_file(&content);
        let outliers = tempfile::NamedTempFile::new().unwrap();
        let mut config = config_for(&file, 10);
        config.word_filter = Some("[.]".to_owned());
        config.word_search = Some("[0-9]+".to_owned());
        config.word_replace = Some("N".to_owned());
        config.outliers = Some(outliers.path().to_path_buf());
        let (_, stats) = run(config);
        assert_eq!(stats.outliers, Some(0));
        assert!(std::fs::read(outliers.path()).unwrap().is_empty());
    }

    #[test]
    fn evicted_candidates_are_outliers() {
        let file = input_file("A B\nA B\nA C\n");
        let outliers = tempfile::NamedTempFile::new().unwrap();
        let mut config = config_for(&file, 2);
        config.outliers = Some(outliers.path().to_path_buf());
        let (_, stats) = run(config);
        // "A C" produced the candidate "A" with support 1, which is evicted.
        assert_eq!(stats.outliers, Some(1));
        assert_eq!(std::fs::read(outliers.path()).unwrap(), b"A C\n");
    }
}

mod test_config {
    use logcluster_rs::{Config, Engine, Error};

    fn base() -> Config {
        Config {
            support: 2,
            inputs: vec!["messages.log".into()],
            ..Config::default()
        }
    }

    #[test]
    fn rejects_contradictory_and_missing_options() {
        let config = Config {
            support: 0,
            ..base()
        };
        assert!(matches!(
            Engine::new(config),
            Err(Error::SupportNotPositive)
        ));

        let config = Config {
            inputs: Vec::new(),
            ..base()
        };
        assert!(matches!(Engine::new(config), Err(Error::NoInputFiles)));

        let config = Config {
            cluster_sketch_size: 1024,
            aggregate_supports: true,
            ..base()
        };
        assert!(matches!(
            Engine::new(config),
            Err(Error::SketchWithAggregation)
        ));

        let config = Config {
            word_filter: Some("[.]".to_owned()),
            ..base()
        };
        assert!(matches!(
            Engine::new(config),
            Err(Error::IncompleteTransform)
        ));

        let config = Config {
            word_weight_threshold: 1.5,
            ..base()
        };
        assert!(matches!(
            Engine::new(config),
            Err(Error::WeightThresholdOutOfRange)
        ));
    }

    #[test]
    fn rejects_bad_regular_expressions() {
        let config = Config {
            separator: "[".to_owned(),
            ..base()
        };
        assert!(matches!(Engine::new(config), Err(Error::BadRegex { .. })));

        let config = Config {
            line_filter: Some("(".to_owned()),
            ..base()
        };
        assert!(matches!(Engine::new(config), Err(Error::BadRegex { .. })));
    }
}

mod test_props {
    use logcluster_rs::{seeded_hash, LinePipeline, Sketch};
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn hash_is_stable_and_bounded(
            key in prop::collection::vec(any::<u8>(), 0..64),
            modulo in 1u64..1_000_000,
            seed in any::<u64>(),
        ) {
            let h = seeded_hash(&key, modulo, seed);
            prop_assert!(h < modulo);
            prop_assert_eq!(h, seeded_hash(&key, modulo, seed));
        }

        #[test]
        fn sketch_never_underestimates(words in prop::collection::vec("[a-z]{1,6}", 1..50)) {
            let mut sketch = Sketch::new(64, 17);
            for word in &words {
                sketch.bump(word.as_bytes());
            }
            for word in &words {
                let true_count = words.iter().filter(|w| w == &word).count() as u64;
                prop_assert!(sketch.estimate(word.as_bytes()) >= true_count);
            }
        }

        #[test]
        fn separator_split_is_exact(words in prop::collection::vec("[a-z]{1,8}", 1..20)) {
            let pipeline = LinePipeline::new("[ ]+", 0, None, None).unwrap();
            let line = words.join(" ");
            let mut tokens = Vec::new();
            pipeline.tokenize(line.as_bytes(), &mut tokens);
            let expected: Vec<Vec<u8>> = words.iter().map(|w| w.as_bytes().to_vec()).collect();
            prop_assert_eq!(tokens, expected);
        }
    }
}
