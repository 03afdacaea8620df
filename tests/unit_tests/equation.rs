use seisflux::expr::{Equation, Mode, Product};
use seisflux::tensor::{BatchedTensor, Scalar, Tensor};
use seisflux::Error;

fn matrices() -> (Tensor, Tensor, Tensor) {
    (
        Tensor::new("A", &[2, 4]).unwrap(),
        Tensor::new("B", &[2, 3]).unwrap(),
        Tensor::new("C", &[3, 4]).unwrap(),
    )
}

#[test]
fn matrix_product_is_balanced() {
    let (a, b, c) = matrices();
    let equation = Equation::assign(a.at("ij").unwrap(), Product::new(b.at("ik").unwrap()).times(c.at("kj").unwrap())).unwrap();
    assert_eq!(equation.mode(), Mode::Assign);
    assert_eq!(equation.to_string(), "A['ij'] = B['ik'] * C['kj']");
    assert_eq!(equation.terms()[0].contracted_labels(equation.lhs().indices()), vec!['k']);

    let names: Vec<_> = equation.tensors().map(|t| t.name().to_string()).collect();
    assert_eq!(names, vec!["A", "B", "C"]);
}

#[test]
fn scaled_accumulation_display() {
    let (a, b, c) = matrices();
    let s = Scalar::new("fluxScale").unwrap();
    let equation = Equation::accumulate(
        a.at("ij").unwrap(),
        Product::scaled(&s, b.at("ik").unwrap()).times(c.at("kj").unwrap()),
    )
    .unwrap();
    assert_eq!(equation.to_string(), "A['ij'] += fluxScale * B['ik'] * C['kj']");
    assert_eq!(equation.scalars().count(), 1);
}

#[test]
fn sum_of_terms_display() {
    let (a, b, c) = matrices();
    let d = Tensor::new("D", &[2, 4]).unwrap();
    let terms = vec![
        Product::new(b.at("ik").unwrap()).times(c.at("kj").unwrap()),
        Product::new(d.at("ij").unwrap()),
    ];
    let equation = Equation::new(a.at("ij").unwrap(), Mode::Assign, terms).unwrap();
    assert_eq!(equation.to_string(), "A['ij'] = B['ik'] * C['kj'] + D['ij']");
}

#[test]
fn contracted_dimension_mismatch_is_rejected() {
    let (a, b, _) = matrices();
    let c = Tensor::new("C", &[4, 4]).unwrap();
    let result = Equation::assign(a.at("ij").unwrap(), Product::new(b.at("ik").unwrap()).times(c.at("kj").unwrap()));
    assert!(matches!(
        result,
        Err(Error::DimensionMismatch {
            label: 'k',
            expected: 3,
            found: 4,
            ..
        })
    ));
}

#[test]
fn free_dimension_mismatch_is_rejected() {
    let (_, b, c) = matrices();
    let a = Tensor::new("A", &[3, 4]).unwrap();
    let result = Equation::assign(a.at("ij").unwrap(), Product::new(b.at("ik").unwrap()).times(c.at("kj").unwrap()));
    assert!(matches!(result, Err(Error::DimensionMismatch { label: 'i', .. })));
}

#[test]
fn unbalanced_indices_are_rejected() {
    let (a, b, c) = matrices();
    let e = Tensor::new("E", &[3]).unwrap();

    // k occurs three times
    let thrice = Product::new(b.at("ik").unwrap())
        .times(c.at("kj").unwrap())
        .times(e.at("k").unwrap());
    assert!(matches!(
        Equation::assign(a.at("ij").unwrap(), thrice),
        Err(Error::UnbalancedIndex { label: 'k', occurrences: 3 })
    ));

    // m is neither free nor contracted
    let dangling = Product::new(b.at("ik").unwrap())
        .times(c.at("kj").unwrap())
        .times(e.at("m").unwrap());
    assert!(matches!(
        Equation::assign(a.at("ij").unwrap(), dangling),
        Err(Error::UnbalancedIndex { label: 'm', occurrences: 1 })
    ));
}

#[test]
fn lhs_index_must_occur_on_rhs() {
    let (a, b, _) = matrices();
    let result = Equation::assign(a.at("ij").unwrap(), Product::new(b.at("ik").unwrap()));
    assert!(matches!(result, Err(Error::MissingLhsIndex { label: 'j' })));
}

#[test]
fn empty_expression_is_rejected() {
    let (a, _, _) = matrices();
    assert!(matches!(
        Equation::new(a.at("ij").unwrap(), Mode::Assign, vec![]),
        Err(Error::EmptyExpression)
    ));
}

#[test]
fn index_count_must_match_rank() {
    let (a, _, _) = matrices();
    assert!(matches!(a.at("ijk"), Err(Error::IndexCountMismatch { rank: 2, .. })));
    assert!(matches!(a.at("ii"), Err(Error::InvalidIndices { .. })));
    assert!(matches!(a.at("i1"), Err(Error::InvalidIndices { .. })));
}

#[test]
fn invalid_declarations_are_rejected() {
    assert!(matches!(Tensor::new("2A", &[2]), Err(Error::InvalidName { .. })));
    assert!(matches!(Tensor::new("A", &[]), Err(Error::InvalidShape { .. })));
    assert!(matches!(Tensor::new("A", &[2, 0]), Err(Error::InvalidShape { .. })));
    assert!(matches!(Scalar::new("flux scale"), Err(Error::InvalidName { .. })));
}

#[test]
fn batched_tensor_inserts_simulation_label() {
    let single = BatchedTensor::new("Q", 's', 1, 0, &[4, 9]).unwrap();
    assert!(!single.has_opt_dim());
    assert_eq!(single.tensor().shape(), &[4, 9]);
    assert_eq!(single.at("kp").unwrap().to_string(), "Q['kp']");

    let batched = BatchedTensor::new("Q", 's', 8, 0, &[4, 9]).unwrap();
    assert!(batched.has_opt_dim());
    assert_eq!(batched.opt_name(), 's');
    assert_eq!(batched.opt_size(), 8);
    assert_eq!(batched.opt_pos(), 0);
    assert_eq!(batched.tensor().shape(), &[8, 4, 9]);
    assert_eq!(batched.at("kp").unwrap().to_string(), "Q['skp']");

    let trailing = BatchedTensor::new("Q", 's', 8, 2, &[4, 9]).unwrap();
    assert_eq!(trailing.tensor().shape(), &[4, 9, 8]);
    assert_eq!(trailing.at("kp").unwrap().to_string(), "Q['kps']");

    // The simulation label is reserved
    assert!(batched.at("sp").is_err());
    assert!(BatchedTensor::new("Q", 's', 8, 3, &[4, 9]).is_err());
    assert!(BatchedTensor::new("Q", 's', 0, 0, &[4, 9]).is_err());
}

#[test]
fn group_names_are_displayed_with_index() {
    let v = Tensor::with_group("V3mTo2n", &[2, 3], &[9, 4]).unwrap();
    assert_eq!(v.at("kl").unwrap().to_string(), "V3mTo2n(2,3)['kl']");
    assert_eq!(v.name().base(), "V3mTo2n");
    assert_eq!(v.name().group(), &[2, 3]);
}
