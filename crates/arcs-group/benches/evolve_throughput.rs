use arcs_core::{GroupingMode, MotivationLevel, PriorityMode, StudentId};
use arcs_group::{form_partition, Coverage, GroupingParams, Member, OptimizerConfig, RunControls};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

fn cohort(size: usize) -> Vec<Member> {
    (0..size)
        .map(|idx| Member {
            student_id: StudentId::new(format!("bench-{idx:03}")),
            level: MotivationLevel::ANALYZED[(idx * 7 + idx / 3) % 3],
        })
        .collect()
}

fn bench_form_partition(c: &mut Criterion) {
    let config = OptimizerConfig::default();
    let mut group = c.benchmark_group("form_partition");
    for size in [12usize, 30, 60] {
        let members = cohort(size);
        let params = GroupingParams {
            mode: GroupingMode::Heterogeneous,
            priority: PriorityMode::Balanced,
            seed: 77,
            coverage: Coverage {
                analyzed: size,
                total: size,
                threshold_percent: 80,
            },
            controls: RunControls::default(),
        };
        group.bench_with_input(BenchmarkId::from_parameter(size), &members, |b, members| {
            b.iter(|| form_partition(members, &params, &config).expect("partition"));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_form_partition);
criterion_main!(benches);
