use orbital_maneuvers::impulsive::{WindowSearchSettings, hohmann_window, interplanetary_ejection};
use orbital_maneuvers::common::constants::{AU_KM, MU_EARTH, MU_SUN};
use orbital_maneuvers::orbits::{Orbit, OrbitalElements};

fn circular(mu: f64, radius: f64, anomaly: f64) -> Orbit {
    Orbit::from_elements(
        mu,
        &OrbitalElements {
            semi_major_axis: radius,
            eccentricity: 0.0,
            inclination: 0.0,
            longitude_of_ascending_node: 0.0,
            argument_of_periapsis: 0.0,
            true_anomaly: anomaly,
        },
        0.0,
    )
    .expect("circular orbit")
}

#[test]
fn earth_to_mars_ejection_matches_hyperbolic_excess() {
    let earth = circular(MU_SUN, AU_KM, 0.0);
    let mars = circular(MU_SUN, 1.524 * AU_KM, 1.2);
    let parking = circular(MU_EARTH, 6_671.0, 0.0);
    let settings = WindowSearchSettings::default();

    let window = hohmann_window(&earth, &mars, 0.0, &settings).expect("heliocentric window");
    let excess = window.burn.magnitude();
    assert!(excess > 2.8 && excess < 3.1, "v_inf = {excess} km/s");

    let burn = interplanetary_ejection(&parking, &earth, &mars, 0.0, &settings).expect("ejection burn");
    let period = parking.period().expect("closed parking orbit");
    assert!(burn.epoch >= 0.0);
    assert!((burn.epoch - window.burn.epoch).abs() <= period);

    let escape = parking.after_burn(&burn).expect("escape orbit");
    assert!(escape.is_hyperbolic());
    let escape_excess = (-MU_EARTH / escape.semi_major_axis()).sqrt();
    assert!(
        (escape_excess - excess).abs() < 1e-6 * excess,
        "escape excess {escape_excess} vs required {excess}"
    );
}

#[test]
fn hyperbolic_parking_orbit_is_rejected() {
    let earth = circular(MU_SUN, AU_KM, 0.0);
    let mars = circular(MU_SUN, 1.524 * AU_KM, 1.2);
    let flyby = Orbit::from_elements(
        MU_EARTH,
        &OrbitalElements {
            semi_major_axis: -30_000.0,
            eccentricity: 1.3,
            inclination: 0.0,
            longitude_of_ascending_node: 0.0,
            argument_of_periapsis: 0.0,
            true_anomaly: 0.0,
        },
        0.0,
    )
    .expect("flyby orbit");
    let err = interplanetary_ejection(&flyby, &earth, &mars, 0.0, &WindowSearchSettings::default()).unwrap_err();
    assert_eq!(err.kind(), orbital_maneuvers::ErrorKind::InvalidInput);
}
