use std::{env, error::Error, fs::File};

use csv::ReaderBuilder;
use log::info;
use ndarray::Array2;
use ndarray_csv::Array2Reader;

use hawt::{
    actuator_disc::DiscInput,
    aerofoil::Aerofoil,
    optimize::{BetzProblem, RotorProblem},
    rotor::{FlowConditions, RotorGeometry},
    BEMSolver,
};

/// usage: `hawt [LIFT_CSV DRAG_CSV]`, the tables hold `alpha_deg, value` rows
fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let args: Vec<String> = env::args().skip(1).collect();
    let aerofoil = match args.as_slice() {
        [] => Aerofoil::naca0012(),
        [lift, drag] => Aerofoil::builder()
            .lift(read_array(lift)?)
            .drag(read_array(drag)?)
            .degrees(true)
            .build()?,
        _ => return Err("expected either no arguments or a lift and a drag table".into()),
    };

    let geometry = RotorGeometry::default();
    let flow = FlowConditions::default();
    let mut solver = BEMSolver::new(&aerofoil, 6)?;
    solver.parallel(true);

    let baseline = solver.evaluate(&geometry, &flow)?;
    println!("baseline: {:#?}", baseline.performance);

    let problem = RotorProblem::new(solver, flow, geometry, RotorProblem::standard_bounds())?;
    let optimum = problem.optimize(300)?;
    info!("optimal design variables: {}", optimum.parameters);
    println!("optimized geometry: {:#?}", optimum.geometry);
    println!("optimized: {:#?}", optimum.performance);

    let betz = BetzProblem::new(DiscInput::default()).solve(1e-8)?;
    println!("actuator disc: a = {:.4}, Cp = {:.4}", betz.a, betz.cp);
    Ok(())
}

fn read_array(path: &str) -> Result<Array2<f64>, Box<dyn Error>> {
    let file = File::open(path)?;
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .delimiter(b',')
        .from_reader(file);

    Ok(reader.deserialize_array2_dynamic()?)
}
