use seisflux::basis::{number_of_2d_basis_functions, number_of_basis_functions, Alignment};
use seisflux::tensor::Tensor;
use seisflux::Error;

#[test]
fn basis_function_counts() {
    let expected_3d = [1, 4, 10, 20, 35, 56, 84];
    let expected_2d = [1, 3, 6, 10, 15, 21, 28];
    for order in 1..=7 {
        assert_eq!(number_of_basis_functions(order).unwrap(), expected_3d[order - 1]);
        assert_eq!(number_of_2d_basis_functions(order).unwrap(), expected_2d[order - 1]);
    }
    assert!(matches!(number_of_basis_functions(0), Err(Error::InvalidOrder { order: 0 })));
}

#[test]
fn huge_orders_are_rejected() {
    assert!(matches!(
        number_of_basis_functions(3_000_000_000),
        Err(Error::InvalidOrder { order: 3_000_000_000 })
    ));
    assert!(matches!(number_of_basis_functions(usize::MAX), Err(Error::InvalidOrder { .. })));
    assert!(matches!(number_of_2d_basis_functions(usize::MAX), Err(Error::InvalidOrder { .. })));
}

#[test]
fn aligned_reals() {
    let avx512 = Alignment::default();
    assert_eq!(avx512.aligned_reals(0), 0);
    assert_eq!(avx512.aligned_reals(1), 8);
    assert_eq!(avx512.aligned_reals(8), 8);
    assert_eq!(avx512.aligned_reals(10), 16);

    let avx2_single = Alignment::new(32, 4).unwrap();
    assert_eq!(avx2_single.aligned_reals(9), 16);
    assert_eq!(avx2_single.aligned_basis_functions(3).unwrap(), 16);
    assert_eq!(avx512.aligned_basis_functions(5).unwrap(), 40);
}

#[test]
fn aligned_shape_pads_leading_dimension_only() {
    let alignment = Alignment::default();
    let tensor = Tensor::new("godunovState", &[9, 9]).unwrap();
    assert_eq!(tensor.aligned_shape(&alignment), vec![9, 9]);
    assert_eq!(tensor.with_align_stride(true).aligned_shape(&alignment), vec![16, 9]);
}

#[test]
fn invalid_alignments_are_rejected() {
    for (vector_bytes, real_bytes) in [(0, 8), (64, 0), (12, 8), (4, 8)] {
        assert!(matches!(
            Alignment::new(vector_bytes, real_bytes),
            Err(Error::InvalidAlignment { .. })
        ));
    }
    let alignment = Alignment::new(16, 4).unwrap();
    assert_eq!(alignment.vector_bytes(), 16);
    assert_eq!(alignment.real_bytes(), 4);
    assert_eq!(alignment.aligned_reals(5), 8);
}
