use std::collections::BTreeMap;
use std::path::PathBuf;

use noc_core::{
    AppIdx, CoreId, Distribution, EdgeId, GraphEdge, GraphTask, NetworkConfig, NiId, TaskGraph,
    TaskId, ThreadPool,
};
use noc_engine::{EntranceIndex, EntranceState, Ni, RatioTokens};
use noc_fabric::{open_file_sinks, EventWheel, LinkSpec, Network};

const REQUIRED_ITERATIONS: u64 = 20;
const EDGE_CAPACITY: u32 = 4;
const TOKEN_BITS: u64 = 256;
const EXEC_A: u64 = 3;
const EXEC_B: u64 = 5;
const MAX_CYCLES: u64 = 5_000;

fn main() {
    simple_log::quick!("info");

    println!("Running a two-task pipeline across two network interfaces...");

    let mut graph = TaskGraph::new();
    graph
        .add_task(GraphTask::new(
            TaskId::new(0),
            CoreId::new(0),
            AppIdx::new(0),
            REQUIRED_ITERATIONS,
            Distribution::Constant(EXEC_A),
            1,
        ))
        .unwrap();
    graph
        .add_task(GraphTask::new(
            TaskId::new(1),
            CoreId::new(1),
            AppIdx::new(0),
            REQUIRED_ITERATIONS,
            Distribution::Constant(EXEC_B),
            2,
        ))
        .unwrap();
    graph
        .add_edge(
            GraphEdge::new(
                EdgeId::new(0),
                TaskId::new(0),
                TaskId::new(1),
                CoreId::new(0),
                CoreId::new(1),
                AppIdx::new(0),
                0,
                EDGE_CAPACITY,
                EDGE_CAPACITY,
                Distribution::Constant(TOKEN_BITS),
                Distribution::Constant(0),
                3,
            )
            .unwrap(),
        )
        .unwrap();

    let cfg = NetworkConfig::default();

    let mut core_to_ni = BTreeMap::new();
    core_to_ni.insert(CoreId::new(0), NiId::new(0));
    core_to_ni.insert(CoreId::new(1), NiId::new(1));

    let entrance = EntranceState {
        entrance_core: CoreId::new(0),
        index: EntranceIndex::build(&graph, CoreId::new(0)),
        initial_pool: ThreadPool::new(2),
        tokens: RatioTokens::new(vec![(AppIdx::new(0), 1)]),
    };
    let ni0 = Ni::new(NiId::new(0), &graph, vec![CoreId::new(0)], 4, &cfg, 1, Some(entrance));
    let ni1 = Ni::new(NiId::new(1), &graph, vec![CoreId::new(1)], 4, &cfg, 1, None);
    let mut nis = BTreeMap::new();
    nis.insert(NiId::new(0), ni0);
    nis.insert(NiId::new(1), ni1);

    let links = [LinkSpec {
        from: NiId::new(0),
        to: NiId::new(1),
        flit_delay: 1,
        credit_delay: 1,
    }];

    let trace_dir: PathBuf = std::env::temp_dir().join("noc-run-pipeline-trace");
    let sinks = open_file_sinks(&trace_dir).expect("failed to open trace output files");

    let mut network = Network::new(cfg, graph, core_to_ni, nis, &links, sinks);
    let mut wheel = EventWheel::new();

    for cycle in 0..MAX_CYCLES {
        wheel.run(&mut network, 1).expect("network step failed");
        if network.graph.task(TaskId::new(1)).unwrap().completed >= REQUIRED_ITERATIONS {
            println!("finished after {} cycles", cycle + 1);
            break;
        }
    }

    println!(
        "task B completed {} of {} required iterations; traces written under {}",
        network.graph.task(TaskId::new(1)).unwrap().completed,
        REQUIRED_ITERATIONS,
        trace_dir.display(),
    );
}
