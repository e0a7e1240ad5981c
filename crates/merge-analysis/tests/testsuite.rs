use indoc::formatdoc;
use merge_analysis::{
    merge_target_pipeline::MergeReport, options::MergeOptions, reporter::DiagnosticReporter,
    resolve_merges, target_filter::TargetFilterOptions,
};
use merge_model::{
    diagnostics::DiagnosticKind,
    model::{DeclarationEnv, TypeRef},
    scan,
};

const MERGE_ANNOTATIONS: &[(&str, &str)] = &[
    (
        "@MergeComponent",
        "import com.squareup.hephaestus.annotations.MergeComponent",
    ),
    (
        "@MergeSubcomponent",
        "import com.squareup.hephaestus.annotations.MergeSubcomponent",
    ),
    (
        "@MergeInterfaces",
        "import com.squareup.hephaestus.annotations.compat.MergeInterfaces",
    ),
];

struct Compiled {
    env: DeclarationEnv,
    report: MergeReport,
}

impl Compiled {
    fn added(&self, target: &str) -> Vec<&str> {
        self.report
            .find(&format!("com.squareup.test.{}", target))
            .unwrap_or_else(|| panic!("`{}` was not resolved", target))
            .added_supertypes
            .iter()
            .map(|ty| ty.simple_name())
            .collect()
    }

    fn messages(&self) -> Vec<String> {
        let mut reporter = DiagnosticReporter::new(&self.env);
        reporter.extend(self.report.diagnostics.iter().cloned());
        reporter
            .diagnostics()
            .iter()
            .map(|d| reporter.format_plain(d))
            .collect()
    }

    fn kinds(&self) -> Vec<DiagnosticKind> {
        self.report.diagnostics.iter().map(|d| d.kind).collect()
    }
}

fn compile_with(source: String, options: MergeOptions) -> Compiled {
    let env = scan([("Source.kt", source)]);
    let report = resolve_merges(&env, options, &TargetFilterOptions::default());
    Compiled { env, report }
}

fn compile(source: String) -> Compiled {
    compile_with(source, MergeOptions::default())
}

/// Runs `test` once per merge annotation with `(annotation, import)`.
fn for_each_annotation(test: impl Fn(&str, &str)) {
    for &(annotation, import) in MERGE_ANNOTATIONS {
        test(annotation, import);
    }
}

#[test]
fn interfaces_are_merged_successfully() {
    for_each_annotation(|annotation, import| {
        let compiled = compile(formatdoc! {"
            package com.squareup.test

            import com.squareup.hephaestus.annotations.ContributesTo
            {import}

            @ContributesTo(Any::class)
            interface ContributingInterface

            @ContributesTo(Any::class)
            interface SecondContributingInterface

            {annotation}(Any::class)
            interface ComponentInterface
        "});
        assert!(!compiled.report.has_errors());
        assert_eq!(
            compiled.added("ComponentInterface"),
            vec!["ContributingInterface", "SecondContributingInterface"]
        );
    });
}

#[test]
fn parent_interface_is_merged_through_the_contribution() {
    for_each_annotation(|annotation, import| {
        let compiled = compile(formatdoc! {"
            package com.squareup.test

            import com.squareup.hephaestus.annotations.ContributesTo
            {import}

            interface ParentInterface

            @ContributesTo(Any::class)
            interface ContributingInterface : ParentInterface

            {annotation}(Any::class)
            interface ComponentInterface
        "});
        assert_eq!(
            compiled.added("ComponentInterface"),
            vec!["ContributingInterface"]
        );
        let contributing = compiled
            .env
            .find_declaration(&TypeRef::new("com.squareup.test.ContributingInterface"))
            .unwrap();
        assert_eq!(
            contributing.supertypes,
            vec![TypeRef::new("com.squareup.test.ParentInterface")]
        );
    });
}

#[test]
fn nothing_is_merged_without_both_annotations() {
    for_each_annotation(|annotation, import| {
        let compiled = compile(formatdoc! {"
            package com.squareup.test

            import com.squareup.hephaestus.annotations.ContributesTo
            {import}

            @ContributesTo(Any::class)
            interface ContributingInterface

            interface ComponentInterface

            interface NotContributed

            {annotation}(Any::class)
            interface OtherComponent
        "});
        assert!(compiled
            .report
            .find("com.squareup.test.ComponentInterface")
            .is_none());
        assert_eq!(
            compiled.added("OtherComponent"),
            vec!["ContributingInterface"]
        );
    });
}

#[test]
fn code_must_be_in_an_allowed_namespace() {
    for_each_annotation(|annotation, import| {
        let compiled = compile_with(
            formatdoc! {"
                package com.other

                import com.squareup.hephaestus.annotations.ContributesTo
                {import}

                @ContributesTo(Any::class)
                interface ContributingInterface

                {annotation}(Any::class)
                interface ComponentInterface
            "},
            MergeOptions {
                allowed_namespaces: vec!["com.squareup".to_string()],
                ..MergeOptions::default()
            },
        );
        assert!(!compiled.report.has_errors());
        assert!(compiled.report.resolved.is_empty());
    });
}

#[test]
fn classes_annotated_with_merge_annotations_must_be_interfaces() {
    for_each_annotation(|annotation, import| {
        let compiled = compile(formatdoc! {"
            package com.squareup.test

            {import}

            {annotation}(Any::class)
            abstract class MergingClass
        "});
        assert_eq!(
            compiled.kinds(),
            vec![DiagnosticKind::InvalidMergeAnnotationTarget]
        );
        assert!(compiled.messages()[0].starts_with("Source.kt: (6, 16)"));
        assert!(compiled.report.resolved.is_empty());
    });
}

#[test]
fn a_contributed_interface_can_be_replaced() {
    for_each_annotation(|annotation, import| {
        let compiled = compile(formatdoc! {"
            package com.squareup.test

            import com.squareup.hephaestus.annotations.ContributesTo
            {import}

            @ContributesTo(Any::class)
            interface ContributingInterface

            @ContributesTo(
                Any::class,
                replaces = ContributingInterface::class
            )
            interface SecondContributingInterface

            {annotation}(Any::class)
            interface ComponentInterface
        "});
        assert!(!compiled.report.has_errors());
        assert_eq!(
            compiled.added("ComponentInterface"),
            vec!["SecondContributingInterface"]
        );
    });
}

#[test]
fn replaced_interfaces_must_be_interfaces_and_not_classes() {
    for_each_annotation(|annotation, import| {
        let compiled = compile(formatdoc! {"
            package com.squareup.test

            import com.squareup.hephaestus.annotations.ContributesTo
            {import}

            @ContributesTo(Any::class)
            class ContributingInterface

            @ContributesTo(
                Any::class,
                replaces = ContributingInterface::class
            )
            interface SecondContributingInterface

            {annotation}(Any::class)
            interface ComponentInterface
        "});
        assert_eq!(
            compiled.kinds(),
            vec![DiagnosticKind::ReplaceTargetNotInterface]
        );
        assert!(compiled.messages()[0].starts_with("Source.kt: (13, 11)"));
        assert!(compiled.report.resolved.is_empty());
    });
}

#[test]
fn replaced_interfaces_must_be_contributed_to_the_same_scope() {
    let compiled = compile(formatdoc! {"
        package com.squareup.test

        @ContributesTo(Unit::class)
        interface ContributingInterface

        @ContributesTo(Any::class, replaces = [ContributingInterface::class])
        interface SecondContributingInterface

        @MergeComponent(Any::class)
        interface ComponentInterface

        @MergeComponent(Unit::class)
        interface UnitComponent
    "});
    assert_eq!(compiled.kinds(), vec![DiagnosticKind::InvalidReplaceTarget]);
    assert!(compiled.messages()[0].starts_with("Source.kt: (7, 11)"));
    // The replace is scope-local: the other scope still resolves.
    assert_eq!(
        compiled.added("UnitComponent"),
        vec!["ContributingInterface"]
    );
}

#[test]
fn predefined_interfaces_are_not_replaced() {
    for_each_annotation(|annotation, import| {
        let compiled = compile(formatdoc! {"
            package com.squareup.test

            import com.squareup.hephaestus.annotations.ContributesTo
            {import}

            @ContributesTo(Any::class)
            interface ContributingInterface

            @ContributesTo(
                Any::class,
                replaces = ContributingInterface::class
            )
            interface SecondContributingInterface

            {annotation}(Any::class)
            interface ComponentInterface : ContributingInterface
        "});
        assert_eq!(
            compiled.added("ComponentInterface"),
            vec!["ContributingInterface", "SecondContributingInterface"]
        );
    });
}

#[test]
fn interfaces_can_be_excluded() {
    for_each_annotation(|annotation, import| {
        let compiled = compile(formatdoc! {"
            package com.squareup.test

            import com.squareup.hephaestus.annotations.ContributesTo
            {import}

            @ContributesTo(Any::class)
            interface ContributingInterface

            @ContributesTo(Any::class)
            interface SecondContributingInterface

            {annotation}(
                scope = Any::class,
                exclude = [
                  ContributingInterface::class
                ]
            )
            interface ComponentInterface
        "});
        assert_eq!(
            compiled.added("ComponentInterface"),
            vec!["SecondContributingInterface"]
        );
    });
}

#[test]
fn predefined_interfaces_are_not_excluded() {
    for_each_annotation(|annotation, import| {
        let compiled = compile(formatdoc! {"
            package com.squareup.test

            import com.squareup.hephaestus.annotations.ContributesTo
            {import}

            @ContributesTo(Any::class)
            interface ContributingInterface

            @ContributesTo(Any::class)
            interface SecondContributingInterface

            {annotation}(
                scope = Any::class,
                exclude = [
                  ContributingInterface::class
                ]
            )
            interface ComponentInterface : ContributingInterface
        "});
        assert_eq!(
            compiled.added("ComponentInterface"),
            vec!["ContributingInterface", "SecondContributingInterface"]
        );
        let resolved = compiled
            .report
            .find("com.squareup.test.ComponentInterface")
            .unwrap();
        let spliced = resolved.spliced_supertypes(&[
            TypeRef::new("com.squareup.test.ContributingInterface")
        ]);
        assert_eq!(spliced.len(), 2);
    });
}

#[test]
fn interfaces_are_added_to_targets_with_the_corresponding_scope() {
    for_each_annotation(|annotation, import| {
        let compiled = compile(formatdoc! {"
            package com.squareup.test

            import com.squareup.hephaestus.annotations.ContributesTo
            {import}

            @ContributesTo(Any::class)
            interface ContributingInterface

            @ContributesTo(Unit::class)
            interface SecondContributingInterface

            {annotation}(Any::class)
            interface ComponentInterface

            {annotation}(Unit::class)
            interface SubcomponentInterface
        "});
        assert_eq!(
            compiled.added("ComponentInterface"),
            vec!["ContributingInterface"]
        );
        assert_eq!(
            compiled.added("SubcomponentInterface"),
            vec!["SecondContributingInterface"]
        );
    });
}

#[test]
fn different_merge_annotations_share_the_same_semantics() {
    let compiled = compile(formatdoc! {"
        package com.squareup.test

        import com.squareup.hephaestus.annotations.ContributesTo
        import com.squareup.hephaestus.annotations.MergeComponent
        import com.squareup.hephaestus.annotations.MergeSubcomponent

        @ContributesTo(Any::class)
        interface ContributingInterface

        @ContributesTo(Unit::class)
        interface SecondContributingInterface

        @MergeComponent(Any::class)
        interface ComponentInterface

        @MergeSubcomponent(Unit::class)
        interface SubcomponentInterface
    "});
    assert_eq!(
        compiled.added("ComponentInterface"),
        vec!["ContributingInterface"]
    );
    assert_eq!(
        compiled.added("SubcomponentInterface"),
        vec!["SecondContributingInterface"]
    );
}

#[test]
fn contributed_interfaces_must_be_public() {
    for visibility in ["internal", "private", "protected"] {
        for_each_annotation(|annotation, import| {
            let compiled = compile(formatdoc! {"
                package com.squareup.test

                import com.squareup.hephaestus.annotations.ContributesTo
                {import}

                @ContributesTo(Any::class)
                {visibility} interface ContributingInterface

                {annotation}(Any::class)
                interface ComponentInterface
            "});
            assert_eq!(
                compiled.kinds(),
                vec![DiagnosticKind::NonPublicContribution]
            );
            let column = visibility.len() + " interface ".len() + 1;
            assert_eq!(
                compiled.messages(),
                vec![format!(
                    "Source.kt: (7, {}) `com.squareup.test.ContributingInterface` is contributed \
                     to the scope `kotlin.Any` and must be public, but it is {}",
                    column, visibility
                )]
            );
            assert!(compiled.report.resolved.is_empty());
        });
    }
}

#[test]
fn inner_interfaces_are_merged() {
    for_each_annotation(|annotation, import| {
        let compiled = compile(formatdoc! {"
            package com.squareup.test

            import com.squareup.hephaestus.annotations.ContributesTo
            {import}

            class SomeClass {{
              @ContributesTo(Any::class)
              interface InnerInterface
            }}

            {annotation}(Any::class)
            interface ComponentInterface
        "});
        assert_eq!(compiled.added("ComponentInterface"), vec!["InnerInterface"]);
    });
}

#[test]
fn inner_interfaces_in_merged_targets_are_not_merged() {
    for_each_annotation(|annotation, import| {
        let compiled = compile(formatdoc! {"
            package com.squareup.test

            import com.squareup.hephaestus.annotations.ContributesTo
            {import}

            {annotation}(Any::class)
            interface ComponentInterface {{
              @ContributesTo(Any::class)
              interface InnerInterface
            }}

            {annotation}(Any::class)
            interface OtherComponent
        "});
        assert!(!compiled.report.has_errors());
        assert!(compiled.added("ComponentInterface").is_empty());
        assert!(compiled.added("OtherComponent").is_empty());
    });
}

#[test]
fn failures_are_per_target_and_reported_together() {
    let compiled = compile(formatdoc! {"
        package com.squareup.test

        @ContributesTo(Any::class)
        internal interface Hidden

        @ContributesTo(Unit::class)
        interface Visible

        @MergeComponent(Any::class)
        interface First

        @MergeSubcomponent(Any::class)
        interface Second

        @MergeComponent(Unit::class)
        interface Third

        @MergeComponent(Unit::class)
        abstract class Broken
    "});
    // The shared non-public contribution is reported once.
    assert_eq!(
        compiled.kinds(),
        vec![
            DiagnosticKind::NonPublicContribution,
            DiagnosticKind::InvalidMergeAnnotationTarget
        ]
    );
    assert_eq!(compiled.added("Third"), vec!["Visible"]);
    assert_eq!(compiled.report.resolved.len(), 1);
}

#[test]
fn resolution_is_deterministic_and_parallel_safe() {
    let mut source = String::from("package com.squareup.test\n\n");
    for i in 0..40 {
        let scope = if i % 2 == 0 { "Any" } else { "Unit" };
        source.push_str(&format!(
            "@ContributesTo({}::class)\ninterface Contribution{}\n\n",
            scope, i
        ));
    }
    for i in 0..20 {
        let scope = if i % 3 == 0 { "Unit" } else { "Any" };
        source.push_str(&format!(
            "@MergeComponent(scope = {}::class, exclude = [Contribution{}::class])\ninterface Target{}\n\n",
            scope,
            i * 2,
            i
        ));
    }
    let sequential = compile(source.clone());
    let again = compile(source.clone());
    let parallel = compile_with(
        source,
        MergeOptions {
            parallel: true,
            ..MergeOptions::default()
        },
    );
    assert_eq!(sequential.report.resolved, again.report.resolved);
    assert_eq!(sequential.report.resolved, parallel.report.resolved);
    assert_eq!(sequential.report.resolved.len(), 20);
    // Scope isolation: every added contribution comes from the target's scope.
    for resolved in &sequential.report.resolved {
        let target = sequential.env.find_merge_target(&resolved.target_type).unwrap();
        for added in &resolved.added_supertypes {
            let contribution = sequential
                .env
                .get_contributions()
                .find(|c| &c.contributed_type == added)
                .unwrap();
            assert!(target.has_scope(&contribution.scope));
        }
    }
}

#[test]
fn block_and_doc_comments_are_ignored() {
    let compiled = compile(formatdoc! {"
        /*
         * Copyright (C) Square, Inc.
         * Licensed under the Apache License, Version 2.0 (the \"License\");
         */
        package com.squareup.test

        import com.squareup.hephaestus.annotations.ContributesTo
        import com.squareup.hephaestus.annotations.MergeComponent

        /**
         * Contributed to every `Any` component. Don't merge it by hand: the
         * annotation processor adds it.
         */
        @ContributesTo(Any::class)
        interface ContributingInterface /* trailing */

        /** The component that receives all contributions. */
        @MergeComponent(/* scope */ Any::class)
        interface ComponentInterface
    "});
    assert!(!compiled.report.has_errors(), "{:?}", compiled.messages());
    assert_eq!(
        compiled.added("ComponentInterface"),
        vec!["ContributingInterface"]
    );
}

#[test]
fn unicode_names_keep_char_columns() {
    let compiled = compile(String::from(
        "@ContributesTo(Any::class)\r\ninternal interface Ä\r\n@MergeComponent(Any::class)\r\ninterface T",
    ));
    assert_eq!(
        compiled.kinds(),
        vec![DiagnosticKind::NonPublicContribution]
    );
    assert_eq!(
        compiled.messages(),
        vec!["Source.kt: (2, 20) `Ä` is contributed to the scope `kotlin.Any` and must be \
              public, but it is internal"
            .to_string()]
    );
}
